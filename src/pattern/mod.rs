pub mod matcher;

use std::cell::OnceCell;
use std::collections::HashMap;

use indexmap::IndexSet;

use crate::model::{Diagram, Id};
use matcher::MultiMatcher;

/// One of the ten classical structural patterns this crate looks for.
/// Closed family: every variant is exhaustively handled wherever a
/// `Pattern` is consumed, rather than left open to extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pattern {
    AbstractFactory {
        factory_interface: Id,
        products: Vec<Id>,
        concrete_factories: Vec<Id>,
        concrete_products: Vec<Id>,
    },
    Adapter {
        target: Id,
        adapter: Id,
        adaptee: Id,
    },
    Bridge {
        abstraction: Id,
        implementor: Id,
        refined_abstractions: Vec<Id>,
        concrete_implementors: Vec<Id>,
    },
    Composite {
        composite: Id,
        component: Id,
        leaves: Vec<Id>,
    },
    Decorator {
        decorator: Id,
        component: Id,
        concrete_components: Vec<Id>,
        concrete_decorators: Vec<Id>,
    },
    Facade {
        facade: Id,
        dependencies: Vec<Id>,
    },
    FactoryMethod {
        factory: Id,
        method: String,
        product: Id,
    },
    Prototype {
        prototype: Id,
        concrete_prototypes: Vec<Id>,
    },
    Proxy {
        proxy: Id,
        subject: Id,
        real_subject: Id,
    },
    Singleton {
        singleton: Id,
        attribute: String,
        method: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    AbstractFactory,
    Adapter,
    Bridge,
    Composite,
    Decorator,
    Facade,
    FactoryMethod,
    Prototype,
    Proxy,
    Singleton,
}

impl PatternKind {
    pub const ALL: [PatternKind; 10] = [
        PatternKind::AbstractFactory,
        PatternKind::Adapter,
        PatternKind::Bridge,
        PatternKind::Composite,
        PatternKind::Decorator,
        PatternKind::Facade,
        PatternKind::FactoryMethod,
        PatternKind::Prototype,
        PatternKind::Proxy,
        PatternKind::Singleton,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PatternKind::AbstractFactory => "AbstractFactory",
            PatternKind::Adapter => "Adapter",
            PatternKind::Bridge => "Bridge",
            PatternKind::Composite => "Composite",
            PatternKind::Decorator => "Decorator",
            PatternKind::Facade => "Facade",
            PatternKind::FactoryMethod => "FactoryMethod",
            PatternKind::Prototype => "Prototype",
            PatternKind::Proxy => "Proxy",
            PatternKind::Singleton => "Singleton",
        }
    }
}

impl std::str::FromStr for PatternKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PatternKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown pattern name '{s}'"))
    }
}

impl Pattern {
    pub fn kind(&self) -> PatternKind {
        match self {
            Pattern::AbstractFactory { .. } => PatternKind::AbstractFactory,
            Pattern::Adapter { .. } => PatternKind::Adapter,
            Pattern::Bridge { .. } => PatternKind::Bridge,
            Pattern::Composite { .. } => PatternKind::Composite,
            Pattern::Decorator { .. } => PatternKind::Decorator,
            Pattern::Facade { .. } => PatternKind::Facade,
            Pattern::FactoryMethod { .. } => PatternKind::FactoryMethod,
            Pattern::Prototype { .. } => PatternKind::Prototype,
            Pattern::Proxy { .. } => PatternKind::Proxy,
            Pattern::Singleton { .. } => PatternKind::Singleton,
        }
    }

    /// Every class identifier this pattern instance involves, used to
    /// build the per-class lookup index and to serialize `ClassesInPattern`.
    pub fn involved_classes(&self) -> Vec<&Id> {
        match self {
            Pattern::AbstractFactory { factory_interface, products, concrete_factories, concrete_products } => {
                let mut v = vec![factory_interface];
                v.extend(products);
                v.extend(concrete_factories);
                v.extend(concrete_products);
                v
            }
            Pattern::Adapter { target, adapter, adaptee } => vec![target, adapter, adaptee],
            Pattern::Bridge { abstraction, implementor, refined_abstractions, concrete_implementors } => {
                let mut v = vec![abstraction, implementor];
                v.extend(refined_abstractions);
                v.extend(concrete_implementors);
                v
            }
            Pattern::Composite { composite, component, leaves } => {
                let mut v = vec![composite, component];
                v.extend(leaves);
                v
            }
            Pattern::Decorator { decorator, component, concrete_components, concrete_decorators } => {
                let mut v = vec![decorator, component];
                v.extend(concrete_components);
                v.extend(concrete_decorators);
                v
            }
            Pattern::Facade { facade, dependencies } => {
                let mut v = vec![facade];
                v.extend(dependencies);
                v
            }
            Pattern::FactoryMethod { factory, product, .. } => vec![factory, product],
            Pattern::Prototype { prototype, concrete_prototypes } => {
                let mut v = vec![prototype];
                v.extend(concrete_prototypes);
                v
            }
            Pattern::Proxy { proxy, subject, real_subject } => vec![proxy, subject, real_subject],
            Pattern::Singleton { singleton, .. } => vec![singleton],
        }
    }
}

/// Drives the [`MultiMatcher`] over every class in a diagram and
/// deduplicates the resulting patterns. Matching runs once, on first
/// query, and is cached for the finder's lifetime.
pub struct PatternFinder<'d> {
    diagram: &'d Diagram,
    matcher: MultiMatcher,
    cache: OnceCell<(IndexSet<Pattern>, HashMap<Id, Vec<Pattern>>)>,
}

impl<'d> PatternFinder<'d> {
    pub fn new(diagram: &'d Diagram) -> Self {
        PatternFinder {
            diagram,
            matcher: MultiMatcher::new(),
            cache: OnceCell::new(),
        }
    }

    fn ensure(&self) -> &(IndexSet<Pattern>, HashMap<Id, Vec<Pattern>>) {
        self.cache.get_or_init(|| {
            let mut all: IndexSet<Pattern> = IndexSet::new();
            for class in self.diagram.classes(false) {
                for pattern in self.matcher.match_class(self.diagram, &class.id) {
                    all.insert(pattern);
                }
            }
            let mut index: HashMap<Id, Vec<Pattern>> = HashMap::new();
            for pattern in &all {
                for cid in pattern.involved_classes() {
                    index.entry(cid.clone()).or_default().push(pattern.clone());
                }
            }
            (all, index)
        })
    }

    /// All detected patterns, optionally narrowed to those involving a
    /// specific class and/or of a specific kind.
    pub fn patterns(&self, class: Option<&str>, kind: Option<PatternKind>) -> Vec<Pattern> {
        let (all, index) = self.ensure();
        let base: Vec<Pattern> = match class {
            Some(c) => index.get(c).cloned().unwrap_or_default(),
            None => all.iter().cloned().collect(),
        };
        base.into_iter().filter(|p| kind.is_none_or(|k| p.kind() == k)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attribute, Method, Scope};

    #[test]
    fn singleton_is_found_and_memoised() {
        let mut d = Diagram::new();
        d.add_class("S".into(), "S".into(), false, None).unwrap();
        d.set_class_attributes(
            "S",
            vec![Attribute { name: "instance".into(), datatype: "S".into(), scope: Scope::Class }],
        )
        .unwrap();
        d.set_class_methods(
            "S",
            vec![Method {
                name: "get_instance".into(),
                scope: Scope::Class,
                return_type: Some("S".into()),
                parameters: vec![],
                abstract_: false,
            }],
        )
        .unwrap();

        let finder = PatternFinder::new(&d);
        let first = finder.patterns(None, None);
        let second = finder.patterns(None, None);
        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
        assert_eq!(first[0].kind(), PatternKind::Singleton);
    }

    #[test]
    fn pattern_kind_from_str_is_case_insensitive() {
        assert_eq!("facade".parse::<PatternKind>().unwrap(), PatternKind::Facade);
        assert!("nonsense".parse::<PatternKind>().is_err());
    }
}
