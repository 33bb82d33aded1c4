use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::model::{AggKind, Attribute, Diagram, Method, Multiplicity, Parameter, RelKind, Relationship, Scope};

mod tag {
    pub const ASSOCIATION: &str = "Association";
    pub const ASSOCIATION_END: &str = "AssociationEnd";
    pub const ATTRIBUTE: &str = "Attribute";
    pub const CLASS: &str = "Class";
    pub const DATATYPE: &str = "DataType";
    pub const DEPENDENCY: &str = "Dependency";
    pub const FROM_END: &str = "FromEnd";
    pub const GENERALIZATION: &str = "Generalization";
    pub const MODEL_CHILDREN: &str = "ModelChildren";
    pub const MODELS: &str = "Models";
    pub const OPERATION: &str = "Operation";
    pub const PACKAGE: &str = "Package";
    pub const PARAMETER: &str = "Parameter";
    pub const REALIZATION: &str = "Realization";
    pub const RET_TYPE: &str = "ReturnType";
    pub const STEREOTYPE: &str = "Stereotype";
    pub const STEREOTYPES: &str = "Stereotypes";
    pub const TO_END: &str = "ToEnd";
    pub const TYPE: &str = "Type";
    pub const USAGE: &str = "Usage";
}

mod attr {
    pub const ABSTRACT: &str = "Abstract";
    pub const AGGREGATION_KIND: &str = "AggregationKind";
    pub const END_MODEL_ELEMENT: &str = "EndModelElement";
    pub const FROM: &str = "From";
    pub const ID: &str = "Id";
    pub const ID_REF: &str = "Idref";
    pub const MULTIPLICITY: &str = "Multiplicity";
    pub const NAME: &str = "Name";
    pub const SCOPE: &str = "Scope";
    pub const TO: &str = "To";
}

/// A minimal in-memory DOM, built once from the quick-xml event
/// stream, so the diagram-specific parsing below can navigate parent
/// to child the way the reference parser's ElementTree API does
/// (`find`, `findall`, `iter`).
#[derive(Debug, Default)]
struct XmlNode {
    tag: String,
    attrs: HashMap<String, String>,
    children: Vec<XmlNode>,
}

impl XmlNode {
    fn find(&self, tag: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.tag == tag)
    }

    fn find_all<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    /// All descendants with the given tag, at any depth.
    fn iter_tag<'a>(&'a self, tag: &str) -> Vec<&'a XmlNode> {
        fn walk<'a>(node: &'a XmlNode, tag: &str, out: &mut Vec<&'a XmlNode>) {
            if node.tag == tag {
                out.push(node);
            }
            for child in &node.children {
                walk(child, tag, out);
            }
        }
        let mut out = Vec::new();
        for child in &self.children {
            walk(child, tag, &mut out);
        }
        out
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    fn require_attr(&self, name: &str) -> Result<&str> {
        self.attr(name)
            .with_context(|| format!("node '{}' has no '{}' attribute", self.tag, name))
    }
}

fn build_tree(xml: &str) -> Result<XmlNode> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut root = XmlNode { tag: "#document".to_string(), ..Default::default() };
    let mut stack: Vec<XmlNode> = vec![];
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).context("malformed XML")? {
            Event::Start(e) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let attrs = e
                    .attributes()
                    .flatten()
                    .filter_map(|a| {
                        let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
                        a.decode_and_unescape_value(reader.decoder()).ok().map(|v| (key, v.into_owned()))
                    })
                    .collect();
                stack.push(XmlNode { tag, attrs, children: Vec::new() });
            }
            Event::Empty(e) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let attrs = e
                    .attributes()
                    .flatten()
                    .filter_map(|a| {
                        let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
                        a.decode_and_unescape_value(reader.decoder()).ok().map(|v| (key, v.into_owned()))
                    })
                    .collect();
                let node = XmlNode { tag, attrs, children: Vec::new() };
                stack.last_mut().unwrap_or(&mut root).children.push(node);
            }
            Event::End(_) => {
                if let Some(node) = stack.pop() {
                    stack.last_mut().unwrap_or(&mut root).children.push(node);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(root)
}

fn parse_abstract(node: &XmlNode) -> bool {
    node.attr(attr::ABSTRACT) == Some("true")
}

fn parse_scope(node: &XmlNode) -> Scope {
    Scope::parse(node.attr(attr::SCOPE).unwrap_or("instance"))
}

fn parse_mult(node: &XmlNode) -> Result<Multiplicity> {
    let raw = node.require_attr(attr::MULTIPLICITY)?;
    Ok(match raw {
        "0" => Multiplicity::Zero,
        "1" | "Unspecified" => Multiplicity::One,
        "*" | "0..*" => Multiplicity::Star,
        "+" | "1..*" => Multiplicity::Plus,
        s if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => Multiplicity::N,
        _ => Multiplicity::One,
    })
}

fn rel_kind_from_tag(tag: &str) -> Option<RelKind> {
    match tag {
        tag::DEPENDENCY | tag::USAGE => Some(RelKind::Dependency),
        tag::GENERALIZATION => Some(RelKind::Generalization),
        tag::REALIZATION => Some(RelKind::Realization),
        tag::ASSOCIATION => Some(RelKind::Association),
        _ => None,
    }
}

fn parse_agg_type(node: &XmlNode) -> AggKind {
    match node.attr(attr::AGGREGATION_KIND).map(str::to_uppercase).as_deref() {
        Some("SHARED") => AggKind::Shared,
        Some("COMPOSITED") => AggKind::Composited,
        _ => AggKind::None,
    }
}

fn ref_datatype(node: &XmlNode) -> Option<String> {
    node.find(tag::TYPE)?.children.first()?.attr(attr::ID_REF).map(str::to_string)
}

fn ref_stereotypes(node: &XmlNode) -> Vec<String> {
    node.find(tag::STEREOTYPES)
        .map(|st| st.find_all(tag::STEREOTYPE).filter_map(|s| s.attr(attr::ID_REF)).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Reads a UML class diagram XML document into a [`Diagram`].
///
/// Malformed relationships (unresolvable endpoints, missing required
/// attributes) are logged and skipped rather than aborting the parse.
pub struct DiagramReader;

impl DiagramReader {
    pub fn read(path: &Path) -> Result<Diagram> {
        let xml = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let root = build_tree(&xml)?;
        let models = root.find(tag::MODELS).context("document has no Models root")?;

        let mut diagram = Diagram::new();
        Self::parse_stereotypes(&mut diagram, models)?;
        Self::parse_datatypes(&mut diagram, models)?;
        Self::parse_classes(&mut diagram, models, None)?;
        Self::parse_packages(&mut diagram, models)?;
        Self::parse_relationships(&mut diagram, models);

        Ok(diagram)
    }

    fn parse_stereotypes(diagram: &mut Diagram, models: &XmlNode) -> Result<()> {
        for node in models.find_all(tag::STEREOTYPE) {
            let id = node.require_attr(attr::ID)?.to_string();
            let name = node.attr(attr::NAME).unwrap_or("").to_string();
            diagram.add_stereotype(id, name)?;
        }
        Ok(())
    }

    fn parse_datatypes(diagram: &mut Diagram, models: &XmlNode) -> Result<()> {
        for node in models.find_all(tag::DATATYPE) {
            let id = node.require_attr(attr::ID)?.to_string();
            let name = node.attr(attr::NAME).unwrap_or("").to_string();
            diagram.add_datatype(id, name)?;
        }
        Ok(())
    }

    fn parse_packages(diagram: &mut Diagram, models: &XmlNode) -> Result<()> {
        for node in models.find_all(tag::PACKAGE) {
            let id = node.require_attr(attr::ID)?.to_string();
            let name = node.attr(attr::NAME).unwrap_or("").to_string();
            diagram.add_package(id.clone(), name)?;
            for children in node.find_all(tag::MODEL_CHILDREN) {
                Self::parse_classes(diagram, children, Some(&id))?;
            }
        }
        Ok(())
    }

    /// Two-pass, matching the reference parser: every class in this
    /// container is created first (so later attribute/method
    /// datatype references can resolve forward declarations), then
    /// each is populated with attributes, methods and stereotypes.
    fn parse_classes(diagram: &mut Diagram, container: &XmlNode, package: Option<&str>) -> Result<()> {
        for node in container.find_all(tag::CLASS) {
            let id = node.require_attr(attr::ID)?.to_string();
            let name = node.attr(attr::NAME).unwrap_or("").to_string();
            diagram.add_class(id, name, parse_abstract(node), package.map(str::to_string))?;
        }
        for node in container.find_all(tag::CLASS) {
            let id = node.require_attr(attr::ID)?;
            Self::populate_class(diagram, id, node)?;
        }
        Ok(())
    }

    fn populate_class(diagram: &mut Diagram, class_id: &str, node: &XmlNode) -> Result<()> {
        let mut attributes = Vec::new();
        let mut methods = Vec::new();

        if let Some(children) = node.find(tag::MODEL_CHILDREN) {
            for attr_node in children.find_all(tag::ATTRIBUTE) {
                attributes.push(Attribute {
                    name: attr_node.attr(attr::NAME).unwrap_or("").to_string(),
                    datatype: ref_datatype(attr_node).unwrap_or_default(),
                    scope: parse_scope(attr_node),
                });
            }
            for op_node in children.find_all(tag::OPERATION) {
                let parameters = op_node
                    .iter_tag(tag::PARAMETER)
                    .into_iter()
                    .map(|p| Parameter {
                        name: p.attr(attr::NAME).unwrap_or("").to_string(),
                        datatype: ref_datatype(p).unwrap_or_default(),
                    })
                    .collect();
                let return_type = op_node.find(tag::RET_TYPE).and_then(ref_datatype);
                methods.push(Method {
                    name: op_node.attr(attr::NAME).unwrap_or("").to_string(),
                    scope: parse_scope(op_node),
                    return_type,
                    parameters,
                    abstract_: parse_abstract(op_node),
                });
            }
        }

        diagram.set_class_attributes(class_id, attributes)?;
        diagram.set_class_methods(class_id, methods)?;
        diagram.set_class_stereotypes(class_id, ref_stereotypes(node))?;
        Ok(())
    }

    fn parse_relationships(diagram: &mut Diagram, models: &XmlNode) {
        let mut dep_like: Vec<&XmlNode> = Vec::new();
        for t in [tag::DEPENDENCY, tag::GENERALIZATION, tag::REALIZATION, tag::USAGE] {
            dep_like.extend(models.iter_tag(t));
        }
        let associations = models.iter_tag(tag::ASSOCIATION);

        let total = (dep_like.len() + associations.len()) as u64;
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>7}/{len:7} {msg}")
                .unwrap()
                .progress_chars("##-"),
        );
        bar.set_message("parsing relationships");

        for node in dep_like {
            if let Err(e) = Self::create_relationship(diagram, node) {
                log::warn!("skipping malformed {}: {e:#}", node.tag);
            }
            bar.inc(1);
        }
        for node in associations {
            if let Err(e) = Self::create_association(diagram, node) {
                log::warn!("skipping malformed Association: {e:#}");
            }
            bar.inc(1);
        }
        bar.finish_and_clear();
    }

    fn create_relationship(diagram: &mut Diagram, node: &XmlNode) -> Result<()> {
        let id = node.require_attr(attr::ID)?.to_string();
        let kind = rel_kind_from_tag(&node.tag).with_context(|| format!("unknown relationship tag '{}'", node.tag))?;
        let from_cls = node.require_attr(attr::FROM)?.to_string();
        let to_cls = node.require_attr(attr::TO)?.to_string();
        diagram.add_relationship(Relationship {
            id,
            kind,
            from_cls,
            to_cls,
            stereotypes: ref_stereotypes(node),
            aggregation: None,
            from_mult: None,
            to_mult: None,
        })?;
        Ok(())
    }

    fn create_association(diagram: &mut Diagram, node: &XmlNode) -> Result<()> {
        let id = node.require_attr(attr::ID)?.to_string();
        let from_node = node
            .find(tag::FROM_END)
            .and_then(|f| f.find(tag::ASSOCIATION_END))
            .context("Association has no FromEnd/AssociationEnd")?;
        let to_node = node
            .find(tag::TO_END)
            .and_then(|t| t.find(tag::ASSOCIATION_END))
            .context("Association has no ToEnd/AssociationEnd")?;

        let from_cls = from_node.require_attr(attr::END_MODEL_ELEMENT)?.to_string();
        let to_cls = to_node.require_attr(attr::END_MODEL_ELEMENT)?.to_string();

        diagram.add_relationship(Relationship {
            id,
            kind: RelKind::Association,
            from_cls,
            to_cls,
            stereotypes: ref_stereotypes(node),
            aggregation: Some(parse_agg_type(from_node)),
            from_mult: Some(parse_mult(from_node)?),
            to_mult: Some(parse_mult(to_node)?),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_doc(xml: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(xml.as_bytes()).unwrap();
        f
    }

    #[test]
    fn reads_classes_and_a_dependency() {
        let xml = r#"<Document><Models>
            <Class Id="a" Name="A"><ModelChildren/></Class>
            <Class Id="b" Name="B"><ModelChildren/></Class>
            <ModelRelationshipContainer>
                <Dependency Id="r1" From="a" To="b"/>
            </ModelRelationshipContainer>
        </Models></Document>"#;
        let file = write_doc(xml);
        let diagram = DiagramReader::read(file.path()).unwrap();
        assert_eq!(diagram.class_count(), 2);
        assert_eq!(diagram.dependencies("a").len(), 1);
        assert_eq!(diagram.dependencies("a")[0].id, "b");
    }

    #[test]
    fn skips_relationship_with_unknown_endpoint() {
        let xml = r#"<Document><Models>
            <Class Id="a" Name="A"><ModelChildren/></Class>
            <ModelRelationshipContainer>
                <Dependency Id="r1" From="a" To="missing"/>
            </ModelRelationshipContainer>
        </Models></Document>"#;
        let file = write_doc(xml);
        let diagram = DiagramReader::read(file.path()).unwrap();
        assert_eq!(diagram.class_count(), 1);
        assert_eq!(diagram.dependencies("a").len(), 0);
    }

    #[test]
    fn reads_nested_package_classes() {
        let xml = r#"<Document><Models>
            <Package Id="pkg" Name="pkg">
                <ModelChildren>
                    <Class Id="a" Name="A"><ModelChildren/></Class>
                </ModelChildren>
            </Package>
        </Models></Document>"#;
        let file = write_doc(xml);
        let diagram = DiagramReader::read(file.path()).unwrap();
        assert_eq!(diagram.class_count(), 1);
        assert_eq!(diagram.class("a").unwrap().qualified_name(&diagram), "pkg.A");
    }
}
