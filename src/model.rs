use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use petgraph::graph::{Graph, NodeIndex};
use petgraph::Directed;

use crate::error::{CoreError, CoreResult};

pub type Id = String;

fn require_non_empty(field: &'static str, value: &str) -> CoreResult<()> {
    if value.is_empty() {
        Err(CoreError::InvalidElement { field })
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Stereotype {
    pub id: Id,
    pub name: String,
}

impl Stereotype {
    pub fn is_creational(&self) -> bool {
        matches!(self.name.as_str(), "create" | "instantiate")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Instance,
    Class,
}

impl Scope {
    /// The original tool only recognises the literal string "instance";
    /// every other value, including the empty string, is a class-level
    /// scope. Kept verbatim rather than expanded into a full match.
    pub fn parse(raw: &str) -> Scope {
        if raw == "instance" {
            Scope::Instance
        } else {
            Scope::Class
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    Zero,
    One,
    N,
    Star,
    Plus,
}

impl Multiplicity {
    pub fn is_at_most_one(self) -> bool {
        matches!(self, Multiplicity::Zero | Multiplicity::One)
    }

    pub fn is_multiple(self) -> bool {
        matches!(self, Multiplicity::N | Multiplicity::Star | Multiplicity::Plus)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub datatype: Id,
    pub scope: Scope,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub datatype: Id,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub name: String,
    pub scope: Scope,
    pub return_type: Option<Id>,
    pub parameters: Vec<Parameter>,
    pub abstract_: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datatype {
    pub id: Id,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub id: Id,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Class {
    pub id: Id,
    pub name: String,
    pub stereotypes: Vec<Id>,
    pub abstract_: bool,
    pub package: Option<Id>,
    pub attributes: Vec<Attribute>,
    pub methods: Vec<Method>,
}

impl Class {
    pub fn is_interface(&self, diagram: &Diagram) -> bool {
        self.stereotypes
            .iter()
            .filter_map(|sid| diagram.stereotypes.get(sid))
            .any(|s| s.name == "Interface")
    }

    pub fn qualified_name(&self, diagram: &Diagram) -> String {
        match self.package.as_ref().and_then(|p| diagram.packages.get(p)) {
            Some(pkg) => format!("{}.{}", pkg.name, self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelKind {
    Association,
    Dependency,
    Generalization,
    Realization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggKind {
    None,
    Shared,
    Composited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Lhs,
    Rhs,
    Any,
}

impl Role {
    pub fn opposite(self) -> Role {
        match self {
            Role::Lhs => Role::Rhs,
            Role::Rhs => Role::Lhs,
            Role::Any => Role::Any,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: Id,
    pub kind: RelKind,
    pub from_cls: Id,
    pub to_cls: Id,
    pub stereotypes: Vec<Id>,
    pub aggregation: Option<AggKind>,
    pub from_mult: Option<Multiplicity>,
    pub to_mult: Option<Multiplicity>,
}

impl Relationship {
    pub fn is_creational(&self, diagram: &Diagram) -> bool {
        self.kind == RelKind::Dependency
            && self
                .stereotypes
                .iter()
                .filter_map(|sid| diagram.stereotypes.get(sid))
                .any(Stereotype::is_creational)
    }

    /// The endpoint of this relationship that is not `from`.
    fn other(&self, from: &str) -> &str {
        if self.from_cls == from {
            &self.to_cls
        } else {
            &self.from_cls
        }
    }

    fn plays(&self, c: &str, role: Role) -> bool {
        match role {
            Role::Lhs => self.from_cls == c,
            Role::Rhs => self.to_cls == c,
            Role::Any => self.from_cls == c || self.to_cls == c,
        }
    }
}

/// A directed multigraph of UML classes, backed by `petgraph` the way
/// the dependency graph in the teacher crate is: a graph of opaque
/// node indices keyed by identifier, with the actual element data kept
/// in side tables so the graph itself only has to carry handles.
#[derive(Debug, Default)]
pub struct Diagram {
    graph: Graph<Id, Id, Directed>,
    class_nodes: HashMap<Id, NodeIndex>,
    classes: IndexMap<Id, Class>,
    datatypes: IndexMap<Id, Datatype>,
    stereotypes: IndexMap<Id, Stereotype>,
    packages: IndexMap<Id, Package>,
    relationships: IndexMap<Id, Relationship>,
    incident: HashMap<Id, Vec<Id>>,
}

impl Diagram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stereotype(&mut self, id: Id, name: String) -> CoreResult<()> {
        require_non_empty("stereotype id", &id)?;
        require_non_empty("stereotype name", &name)?;
        self.stereotypes.insert(id.clone(), Stereotype { id, name });
        Ok(())
    }

    pub fn add_datatype(&mut self, id: Id, name: String) -> CoreResult<()> {
        require_non_empty("datatype id", &id)?;
        require_non_empty("datatype name", &name)?;
        self.datatypes.insert(id.clone(), Datatype { id, name });
        Ok(())
    }

    pub fn add_package(&mut self, id: Id, name: String) -> CoreResult<()> {
        require_non_empty("package id", &id)?;
        require_non_empty("package name", &name)?;
        self.packages.insert(id.clone(), Package { id, name });
        Ok(())
    }

    pub fn add_class(
        &mut self,
        id: Id,
        name: String,
        abstract_: bool,
        package: Option<Id>,
    ) -> CoreResult<()> {
        require_non_empty("class id", &id)?;
        require_non_empty("class name", &name)?;
        let node = self.graph.add_node(id.clone());
        self.class_nodes.insert(id.clone(), node);
        self.classes.insert(
            id.clone(),
            Class {
                id,
                name,
                stereotypes: Vec::new(),
                abstract_,
                package,
                attributes: Vec::new(),
                methods: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn set_class_stereotypes(&mut self, class_id: &str, stereotypes: Vec<Id>) -> CoreResult<()> {
        let class = self.classes.get_mut(class_id).ok_or_else(|| CoreError::NotFound {
            kind: "class",
            id: class_id.to_string(),
        })?;
        class.stereotypes = stereotypes;
        Ok(())
    }

    pub fn set_class_attributes(&mut self, class_id: &str, attributes: Vec<Attribute>) -> CoreResult<()> {
        let class = self.classes.get_mut(class_id).ok_or_else(|| CoreError::NotFound {
            kind: "class",
            id: class_id.to_string(),
        })?;
        class.attributes = attributes;
        Ok(())
    }

    pub fn set_class_methods(&mut self, class_id: &str, methods: Vec<Method>) -> CoreResult<()> {
        let class = self.classes.get_mut(class_id).ok_or_else(|| CoreError::NotFound {
            kind: "class",
            id: class_id.to_string(),
        })?;
        class.methods = methods;
        Ok(())
    }

    pub fn add_relationship(&mut self, rel: Relationship) -> CoreResult<()> {
        require_non_empty("relationship id", &rel.id)?;
        let from_node = *self.class_nodes.get(&rel.from_cls).ok_or_else(|| CoreError::NotFound {
            kind: "class",
            id: rel.from_cls.clone(),
        })?;
        let to_node = *self.class_nodes.get(&rel.to_cls).ok_or_else(|| CoreError::NotFound {
            kind: "class",
            id: rel.to_cls.clone(),
        })?;
        self.graph.add_edge(from_node, to_node, rel.id.clone());
        self.incident.entry(rel.from_cls.clone()).or_default().push(rel.id.clone());
        if rel.to_cls != rel.from_cls {
            self.incident.entry(rel.to_cls.clone()).or_default().push(rel.id.clone());
        }
        self.relationships.insert(rel.id.clone(), rel);
        Ok(())
    }

    pub fn class(&self, id: &str) -> Option<&Class> {
        self.classes.get(id)
    }

    pub fn stereotype(&self, id: &str) -> Option<&Stereotype> {
        self.stereotypes.get(id)
    }

    pub fn package(&self, id: &str) -> Option<&Package> {
        self.packages.get(id)
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    pub fn is_interface(&self, class_id: &str) -> bool {
        self.classes.get(class_id).is_some_and(|c| c.is_interface(self))
    }

    /// Classes in insertion (document) order, optionally excluding
    /// interfaces.
    pub fn classes(&self, exclude_interfaces: bool) -> impl Iterator<Item = &Class> {
        self.classes.values().filter(move |c| !exclude_interfaces || !c.is_interface(self))
    }

    fn relationships_raw(
        &self,
        c: &str,
        kind: Option<RelKind>,
        role: Role,
        pred: Option<&dyn Fn(&Relationship) -> bool>,
    ) -> Vec<&Relationship> {
        self.incident
            .get(c)
            .into_iter()
            .flatten()
            .filter_map(|rid| self.relationships.get(rid))
            .filter(|r| kind.is_none_or(|k| r.kind == k))
            .filter(|r| r.plays(c, role))
            .filter(|r| pred.is_none_or(|p| p(r)))
            .collect()
    }

    pub fn relationships(
        &self,
        c: &str,
        kind: Option<RelKind>,
        role: Role,
        pred: Option<&dyn Fn(&Relationship) -> bool>,
    ) -> Vec<&Relationship> {
        self.relationships_raw(c, kind, role, pred)
    }

    pub fn related_classes(
        &self,
        c: &str,
        kind: Option<RelKind>,
        role: Role,
        pred: Option<&dyn Fn(&Relationship) -> bool>,
    ) -> Vec<&Class> {
        self.relationships_raw(c, kind, role, pred)
            .into_iter()
            .filter_map(|r| self.classes.get(r.other(c)))
            .collect()
    }

    pub fn associated_classes(
        &self,
        c: &str,
        role: Role,
        pred: Option<&dyn Fn(&Relationship) -> bool>,
    ) -> Vec<&Class> {
        self.related_classes(c, Some(RelKind::Association), role, pred)
    }

    /// Downward: classes that have `c` as their direct superclass.
    pub fn sub_classes(&self, c: &str) -> Vec<&Class> {
        self.related_classes(c, Some(RelKind::Generalization), Role::Rhs, None)
    }

    /// Upward: the direct superclasses of `c`.
    pub fn super_classes(&self, c: &str) -> Vec<&Class> {
        self.related_classes(c, Some(RelKind::Generalization), Role::Lhs, None)
    }

    /// Classes that realize `c`. Empty unless `c` is an interface.
    pub fn realizations(&self, c: &str) -> Vec<&Class> {
        if !self.is_interface(c) {
            return Vec::new();
        }
        self.related_classes(c, Some(RelKind::Realization), Role::Rhs, None)
    }

    /// Interfaces that `c` realizes.
    pub fn interfaces(&self, c: &str) -> Vec<&Class> {
        self.related_classes(c, Some(RelKind::Realization), Role::Lhs, None)
    }

    pub fn dependencies(&self, c: &str) -> Vec<&Class> {
        self.related_classes(c, Some(RelKind::Dependency), Role::Lhs, None)
    }

    pub fn dependants(&self, c: &str) -> Vec<&Class> {
        self.related_classes(c, Some(RelKind::Dependency), Role::Rhs, None)
    }

    /// Transitive closure of `super_classes`, in discovery order.
    pub fn ancestors(&self, c: &str) -> Vec<&Class> {
        let mut seen: IndexSet<Id> = IndexSet::new();
        let mut frontier: Vec<Id> = self.super_classes(c).into_iter().map(|k| k.id.clone()).collect();
        while let Some(id) = frontier.pop() {
            if seen.insert(id.clone()) {
                frontier.extend(self.super_classes(&id).into_iter().map(|k| k.id.clone()));
            }
        }
        seen.iter().filter_map(|id| self.classes.get(id)).collect()
    }

    pub fn has_sub_classes(&self, c: &str) -> bool {
        !self.sub_classes(c).is_empty()
    }

    pub fn has_super_classes(&self, c: &str) -> bool {
        !self.super_classes(c).is_empty()
    }

    pub fn has_realizations(&self, c: &str) -> bool {
        !self.realizations(c).is_empty()
    }

    pub fn is_sub_class(&self, c: &str, of: &str) -> bool {
        self.ancestors(c).iter().any(|k| k.id == of)
    }

    pub fn is_realization(&self, c: &str, interface: &str) -> bool {
        self.interfaces(c).iter().any(|k| k.id == interface)
    }

    /// Classes with no subclass; interfaces are excluded. When
    /// `exclude_standalone` is set, a leaf must also have at least one
    /// superclass.
    pub fn leaf_classes(&self, exclude_standalone: bool) -> Vec<&Class> {
        self.classes(true)
            .filter(|c| !self.has_sub_classes(&c.id))
            .filter(|c| !exclude_standalone || self.has_super_classes(&c.id))
            .collect()
    }

    /// Longest chain of `super_classes` starting from `c`.
    pub fn inheritance_depth(&self, c: &str) -> usize {
        self.super_classes(c)
            .iter()
            .map(|s| 1 + self.inheritance_depth(&s.id))
            .max()
            .unwrap_or(0)
    }

    /// `c`'s own methods followed by those of every interface it
    /// realizes and every superclass, transitively. Duplicates are
    /// retained.
    pub fn methods(&self, c: &str) -> Vec<Method> {
        let mut out = Vec::new();
        if let Some(class) = self.classes.get(c) {
            out.extend(class.methods.iter().cloned());
        }
        for iface in self.interfaces(c) {
            out.extend(self.methods(&iface.id));
        }
        for sup in self.super_classes(c) {
            out.extend(self.methods(&sup.id));
        }
        out
    }
}
