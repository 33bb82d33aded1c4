use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::model::{AggKind, Diagram, Id, Multiplicity, RelKind, Relationship, Role, Scope};

use super::Pattern;

fn all_unique(ids: &[&str]) -> bool {
    let mut seen = HashSet::new();
    ids.iter().all(|id| seen.insert(*id))
}

fn creational_dependency_targets(diagram: &Diagram, c: &str) -> Vec<Id> {
    diagram
        .relationships(c, Some(RelKind::Dependency), Role::Lhs, None)
        .into_iter()
        .filter(|r| r.is_creational(diagram))
        .map(|r| r.to_cls.clone())
        .collect()
}

fn factory_method_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(alloc|build|construct|create|instantiate|new)").unwrap())
}

/// Applies one structural probe to a single anchor class.
pub trait Matcher {
    fn match_class(&self, diagram: &Diagram, c: &str) -> Vec<Pattern>;
}

pub struct FactoryMethodMatcher;

impl FactoryMethodMatcher {
    /// Every (method name, product class) pair found on `c`. Shared
    /// with `AbstractFactoryMatcher`, which needs the same
    /// identification of factory methods on the interface it anchors.
    fn factory_methods(&self, diagram: &Diagram, c: &str) -> Vec<(String, Id)> {
        if diagram.class(c).is_none() {
            return Vec::new();
        }
        let created = creational_dependency_targets(diagram, c)
            .into_iter()
            .filter(|id| !diagram.is_interface(id))
            .collect::<Vec<_>>();

        diagram
            .methods(c)
            .into_iter()
            .filter(|m| factory_method_name_re().is_match(&m.name))
            .filter_map(|m| {
                let return_type = m.return_type.as_ref()?;
                diagram.class(return_type)?;
                let product = if diagram.is_interface(return_type) {
                    created
                        .iter()
                        .find(|cr| diagram.is_realization(cr, return_type))
                        .cloned()
                        .unwrap_or_else(|| return_type.clone())
                } else {
                    return_type.clone()
                };
                Some((m.name.clone(), product))
            })
            .collect()
    }
}

impl Matcher for FactoryMethodMatcher {
    fn match_class(&self, diagram: &Diagram, c: &str) -> Vec<Pattern> {
        self.factory_methods(diagram, c)
            .into_iter()
            .map(|(method, product)| Pattern::FactoryMethod { factory: c.to_string(), method, product })
            .collect()
    }
}

pub struct AbstractFactoryMatcher<'a> {
    factory_method: &'a FactoryMethodMatcher,
}

impl<'a> AbstractFactoryMatcher<'a> {
    pub fn new(factory_method: &'a FactoryMethodMatcher) -> Self {
        AbstractFactoryMatcher { factory_method }
    }
}

impl Matcher for AbstractFactoryMatcher<'_> {
    fn match_class(&self, diagram: &Diagram, c: &str) -> Vec<Pattern> {
        if !diagram.is_interface(c) {
            return Vec::new();
        }
        let mut products: Vec<Id> = Vec::new();
        for (_, product) in self.factory_method.factory_methods(diagram, c) {
            if !products.contains(&product) {
                products.push(product);
            }
        }
        if products.is_empty() {
            return Vec::new();
        }

        let mut concrete_factories = Vec::new();
        let mut concrete_products: Vec<Id> = Vec::new();
        for factory in diagram.realizations(c) {
            let created = creational_dependency_targets(diagram, &factory.id);
            if !created.is_empty() {
                concrete_factories.push(factory.id.clone());
                for p in created {
                    if !concrete_products.contains(&p) {
                        concrete_products.push(p);
                    }
                }
            }
        }
        if concrete_factories.is_empty() || concrete_products.is_empty() {
            return Vec::new();
        }

        vec![Pattern::AbstractFactory {
            factory_interface: c.to_string(),
            products,
            concrete_factories,
            concrete_products,
        }]
    }
}

pub struct AdapterMatcher;

impl Matcher for AdapterMatcher {
    fn match_class(&self, diagram: &Diagram, c: &str) -> Vec<Pattern> {
        if !diagram.is_interface(c) {
            return Vec::new();
        }
        let mut out = Vec::new();
        for a in diagram.realizations(c) {
            let mut adaptees: Vec<Id> = diagram
                .relationships(&a.id, Some(RelKind::Dependency), Role::Lhs, None)
                .into_iter()
                .filter(|r| !r.is_creational(diagram))
                .map(|r| r.to_cls.clone())
                .collect();
            adaptees.extend(diagram.super_classes(&a.id).into_iter().map(|s| s.id.clone()));
            if adaptees.len() == 1 {
                let adaptee = adaptees.into_iter().next().unwrap();
                if all_unique(&[c, &a.id, &adaptee]) {
                    out.push(Pattern::Adapter { target: c.to_string(), adapter: a.id.clone(), adaptee });
                }
            }
        }
        out
    }
}

pub struct BridgeMatcher;

impl Matcher for BridgeMatcher {
    fn match_class(&self, diagram: &Diagram, c: &str) -> Vec<Pattern> {
        if diagram.is_interface(c) || !diagram.has_sub_classes(c) {
            return Vec::new();
        }
        let is_bridge_assoc = |r: &Relationship| {
            matches!(r.aggregation, Some(AggKind::Shared) | Some(AggKind::Composited))
        };
        let implementors: Vec<Id> = diagram
            .associated_classes(c, Role::Lhs, Some(&is_bridge_assoc))
            .into_iter()
            .map(|k| k.id.clone())
            .collect();
        if implementors.len() != 1 {
            return Vec::new();
        }
        let implementor = implementors.into_iter().next().unwrap();
        let mut concrete_implementors: Vec<Id> =
            diagram.sub_classes(&implementor).into_iter().map(|k| k.id.clone()).collect();
        concrete_implementors.extend(diagram.realizations(&implementor).into_iter().map(|k| k.id.clone()));
        let refined_abstractions: Vec<Id> = diagram.sub_classes(c).into_iter().map(|k| k.id.clone()).collect();

        let mut ids: Vec<&str> = vec![c, implementor.as_str()];
        ids.extend(refined_abstractions.iter().map(String::as_str));
        ids.extend(concrete_implementors.iter().map(String::as_str));
        if !all_unique(&ids) {
            return Vec::new();
        }

        vec![Pattern::Bridge {
            abstraction: c.to_string(),
            implementor,
            refined_abstractions,
            concrete_implementors,
        }]
    }
}

pub struct CompositeMatcher;

impl Matcher for CompositeMatcher {
    fn match_class(&self, diagram: &Diagram, c: &str) -> Vec<Pattern> {
        let mut leaves: Vec<Id> = if diagram.is_interface(c) {
            diagram.realizations(c).into_iter().map(|k| k.id.clone()).collect()
        } else {
            diagram.sub_classes(c).into_iter().map(|k| k.id.clone()).collect()
        };
        if leaves.len() < 2 {
            return Vec::new();
        }

        let is_composite_assoc = |r: &Relationship| {
            matches!(r.aggregation, Some(AggKind::Shared) | Some(AggKind::Composited))
                && r.from_mult == Some(Multiplicity::One)
                && r.to_mult.is_some_and(Multiplicity::is_multiple)
        };
        let composites: Vec<Id> = diagram
            .related_classes(c, Some(RelKind::Association), Role::Rhs, Some(&is_composite_assoc))
            .into_iter()
            .map(|k| k.id.clone())
            .filter(|id| leaves.contains(id))
            .collect();
        leaves.retain(|l| !composites.contains(l));

        let mut out = Vec::new();
        for k in &composites {
            let mut ids: Vec<&str> = vec![k.as_str(), c];
            ids.extend(leaves.iter().map(String::as_str));
            if all_unique(&ids) {
                out.push(Pattern::Composite { composite: k.clone(), component: c.to_string(), leaves: leaves.clone() });
            }
        }
        out
    }
}

pub struct DecoratorMatcher;

impl Matcher for DecoratorMatcher {
    fn match_class(&self, diagram: &Diagram, c: &str) -> Vec<Pattern> {
        let concrete_components: Vec<Id> = if diagram.is_interface(c) {
            diagram.realizations(c).into_iter().map(|k| k.id.clone()).collect()
        } else {
            diagram.sub_classes(c).into_iter().map(|k| k.id.clone()).collect()
        };
        if concrete_components.len() < 2 {
            return Vec::new();
        }

        let is_decorator_assoc = |r: &Relationship| {
            matches!(r.aggregation, Some(AggKind::Shared) | Some(AggKind::Composited))
                && r.from_mult.is_some_and(|m| [Multiplicity::One].contains(&m))
                && r.to_mult == Some(Multiplicity::One)
        };
        let decorators: Vec<Id> = diagram
            .related_classes(c, Some(RelKind::Association), Role::Rhs, Some(&is_decorator_assoc))
            .into_iter()
            .map(|k| k.id.clone())
            .filter(|id| concrete_components.contains(id))
            .filter(|id| diagram.has_sub_classes(id))
            .collect();

        let remaining_components: Vec<Id> =
            concrete_components.into_iter().filter(|cc| !decorators.contains(cc)).collect();

        let mut out = Vec::new();
        for d in &decorators {
            let concrete_decorators: Vec<Id> = diagram.sub_classes(d).into_iter().map(|k| k.id.clone()).collect();
            let mut ids: Vec<&str> = vec![d.as_str(), c];
            ids.extend(remaining_components.iter().map(String::as_str));
            ids.extend(concrete_decorators.iter().map(String::as_str));
            if all_unique(&ids) {
                out.push(Pattern::Decorator {
                    decorator: d.clone(),
                    component: c.to_string(),
                    concrete_components: remaining_components.clone(),
                    concrete_decorators,
                });
            }
        }
        out
    }
}

pub struct FacadeMatcher;

impl Matcher for FacadeMatcher {
    fn match_class(&self, diagram: &Diagram, c: &str) -> Vec<Pattern> {
        let deps: Vec<Id> = diagram.dependencies(c).into_iter().map(|k| k.id.clone()).collect();
        if deps.len() > 2 {
            vec![Pattern::Facade { facade: c.to_string(), dependencies: deps }]
        } else {
            Vec::new()
        }
    }
}

pub struct PrototypeMatcher;

impl Matcher for PrototypeMatcher {
    fn match_class(&self, diagram: &Diagram, c: &str) -> Vec<Pattern> {
        if !diagram.is_interface(c) {
            return Vec::new();
        }
        let class = match diagram.class(c) {
            Some(class) => class,
            None => return Vec::new(),
        };
        let has_clone_method = class
            .methods
            .iter()
            .any(|m| m.return_type.as_deref() == Some(c) && (m.name == "clone" || m.name == "copy"));
        if !has_clone_method {
            return Vec::new();
        }
        let concrete_prototypes: Vec<Id> = diagram.realizations(c).into_iter().map(|k| k.id.clone()).collect();
        if concrete_prototypes.is_empty() {
            return Vec::new();
        }
        vec![Pattern::Prototype { prototype: c.to_string(), concrete_prototypes }]
    }
}

pub struct ProxyMatcher;

impl Matcher for ProxyMatcher {
    fn match_class(&self, diagram: &Diagram, c: &str) -> Vec<Pattern> {
        let candidates: Vec<Id> = if diagram.is_interface(c) {
            diagram.realizations(c).into_iter().map(|k| k.id.clone()).collect()
        } else {
            diagram.sub_classes(c).into_iter().map(|k| k.id.clone()).collect()
        };
        if candidates.len() < 2 {
            return Vec::new();
        }

        let mut out = Vec::new();
        for p in &candidates {
            if !diagram.associated_classes(p, Role::Lhs, None).is_empty() {
                continue;
            }
            let deps = diagram.dependencies(p);
            if deps.len() != 1 {
                continue;
            }
            let real_subject = deps[0].id.clone();
            if !candidates.contains(&real_subject) {
                continue;
            }
            if all_unique(&[p.as_str(), c, real_subject.as_str()]) {
                out.push(Pattern::Proxy { proxy: p.clone(), subject: c.to_string(), real_subject });
            }
        }
        out
    }
}

pub struct SingletonMatcher;

impl Matcher for SingletonMatcher {
    fn match_class(&self, diagram: &Diagram, c: &str) -> Vec<Pattern> {
        let class = match diagram.class(c) {
            Some(class) => class,
            None => return Vec::new(),
        };
        let attribute = class.attributes.iter().find(|a| a.scope == Scope::Class && a.datatype == c);
        let method = class
            .methods
            .iter()
            .find(|m| m.scope == Scope::Class && m.parameters.is_empty() && m.return_type.as_deref() == Some(c));
        match (attribute, method) {
            (Some(a), Some(m)) => {
                vec![Pattern::Singleton { singleton: c.to_string(), attribute: a.name.clone(), method: m.name.clone() }]
            }
            _ => Vec::new(),
        }
    }
}

/// Composition of all ten matchers, registration order preserved in
/// the result. Abstract Factory shares its `FactoryMethodMatcher`
/// instance rather than owning a second one.
pub struct MultiMatcher {
    factory_method: FactoryMethodMatcher,
}

impl MultiMatcher {
    pub fn new() -> Self {
        MultiMatcher { factory_method: FactoryMethodMatcher }
    }

    pub fn match_class(&self, diagram: &Diagram, c: &str) -> Vec<Pattern> {
        let abstract_factory = AbstractFactoryMatcher::new(&self.factory_method);
        let matchers: Vec<&dyn Matcher> = vec![
            &abstract_factory,
            &AdapterMatcher,
            &BridgeMatcher,
            &CompositeMatcher,
            &DecoratorMatcher,
            &FacadeMatcher,
            &self.factory_method,
            &PrototypeMatcher,
            &ProxyMatcher,
            &SingletonMatcher,
        ];
        matchers.into_iter().flat_map(|m| m.match_class(diagram, c)).collect()
    }
}

impl Default for MultiMatcher {
    fn default() -> Self {
        Self::new()
    }
}
