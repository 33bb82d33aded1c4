use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{json, Value};

use crate::cycle::Cycle;
use crate::metric::MetricValue;
use crate::model::Diagram;
use crate::pattern::Pattern;

/// Loads the optional metric-weight configuration file. A missing
/// path yields an empty configuration (every metric contributes zero
/// to `RemediationCost`).
pub fn load_metric_config(path: Option<&Path>) -> Result<HashMap<String, f64>> {
    let Some(path) = path else {
        return Ok(HashMap::new());
    };
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing metric config {}", path.display()))
}

fn class_label(diagram: &Diagram, id: &str) -> String {
    diagram.class(id).map(|c| c.qualified_name(diagram)).unwrap_or_else(|| id.to_string())
}

fn pattern_fields(pattern: &Pattern, diagram: &Diagram) -> Vec<(&'static str, Value)> {
    let cls = |id: &str| json!(class_label(diagram, id));
    let cls_list = |ids: &[String]| json!(ids.iter().map(|id| class_label(diagram, id)).collect::<Vec<_>>());

    match pattern {
        Pattern::AbstractFactory { factory_interface, products, concrete_factories, concrete_products } => vec![
            ("factory_interface", cls(factory_interface)),
            ("products", cls_list(products)),
            ("concrete_factories", cls_list(concrete_factories)),
            ("concrete_products", cls_list(concrete_products)),
        ],
        Pattern::Adapter { target, adapter, adaptee } => {
            vec![("target", cls(target)), ("adapter", cls(adapter)), ("adaptee", cls(adaptee))]
        }
        Pattern::Bridge { abstraction, implementor, refined_abstractions, concrete_implementors } => vec![
            ("abstraction", cls(abstraction)),
            ("implementor", cls(implementor)),
            ("refined_abstractions", cls_list(refined_abstractions)),
            ("concrete_implementors", cls_list(concrete_implementors)),
        ],
        Pattern::Composite { composite, component, leaves } => {
            vec![("composite", cls(composite)), ("component", cls(component)), ("leaves", cls_list(leaves))]
        }
        Pattern::Decorator { decorator, component, concrete_components, concrete_decorators } => vec![
            ("decorator", cls(decorator)),
            ("component", cls(component)),
            ("concrete_components", cls_list(concrete_components)),
            ("concrete_decorators", cls_list(concrete_decorators)),
        ],
        Pattern::Facade { facade, dependencies } => vec![("facade", cls(facade)), ("dependencies", cls_list(dependencies))],
        Pattern::FactoryMethod { factory, method, product } => {
            vec![("factory", cls(factory)), ("method", json!(method)), ("product", cls(product))]
        }
        Pattern::Prototype { prototype, concrete_prototypes } => {
            vec![("prototype", cls(prototype)), ("concrete_prototypes", cls_list(concrete_prototypes))]
        }
        Pattern::Proxy { proxy, subject, real_subject } => {
            vec![("proxy", cls(proxy)), ("subject", cls(subject)), ("real_subject", cls(real_subject))]
        }
        Pattern::Singleton { singleton, attribute, method } => {
            vec![("singleton", cls(singleton)), ("attribute", json!(attribute)), ("method", json!(method))]
        }
    }
}

fn pattern_repr(pattern: &Pattern, diagram: &Diagram) -> String {
    let fields = pattern_fields(pattern, diagram);
    let body = fields
        .iter()
        .map(|(k, v)| format!("{k}={}", v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string())))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{}({body})", pattern.kind().name())
}

pub fn format_patterns_text(patterns: &[Pattern], diagram: &Diagram) -> String {
    let mut lines: Vec<String> = patterns.iter().map(|p| pattern_repr(p, diagram)).collect();
    lines.sort();
    lines.join("\n")
}

pub fn format_cycles_text(cycles: &[&Cycle], diagram: &Diagram) -> String {
    let mut sorted: Vec<&&Cycle> = cycles.iter().collect();
    sorted.sort_by_key(|c| c.repr(diagram));
    sorted
        .into_iter()
        .map(|c| {
            let mut names: Vec<String> = c.classes.iter().map(|id| class_label(diagram, id)).collect();
            if let Some(first) = names.first().cloned() {
                names.push(first);
            }
            names.join(" -> ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_number(value: f64, is_integer: bool) -> String {
    if value.is_infinite() {
        return "inf".to_string();
    }
    if is_integer {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

pub fn format_metrics_text(values: &[MetricValue]) -> String {
    let mut lines: Vec<(String, String)> = values
        .iter()
        .map(|v| (v.kind.name().to_string(), format_number(v.value, v.kind.is_integer())))
        .collect();
    lines.sort_by(|a, b| a.0.cmp(&b.0));
    lines.into_iter().map(|(name, value)| format!("{name}: {value}")).collect::<Vec<_>>().join("\n")
}

pub fn patterns_to_json(patterns: &[Pattern], diagram: &Diagram) -> Value {
    let mut grouped: indexmap::IndexMap<&'static str, Vec<Value>> = indexmap::IndexMap::new();
    for pattern in patterns {
        let obj: serde_json::Map<String, Value> =
            pattern_fields(pattern, diagram).into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        grouped.entry(pattern.kind().name()).or_default().push(Value::Object(obj));
    }
    let map: serde_json::Map<String, Value> =
        grouped.into_iter().map(|(k, v)| (k.to_string(), Value::Array(v))).collect();
    Value::Object(map)
}

pub fn cycles_to_json(cycles: &[&Cycle], diagram: &Diagram) -> Value {
    json!(cycles
        .iter()
        .map(|c| c.classes.iter().map(|id| class_label(diagram, id)).collect::<Vec<_>>())
        .collect::<Vec<_>>())
}

pub fn metrics_to_json(values: &[MetricValue]) -> Value {
    let map: serde_json::Map<String, Value> =
        values.iter().map(|v| (v.kind.identifier(), json!(v.value))).collect();
    Value::Object(map)
}

fn write_json(value: &Value, path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(value).context("encoding JSON output")?;
    std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))
}

/// With an output path: encode as JSON and write to that file. With
/// none: print the sorted textual form to stdout. This mirrors the
/// reference tool's behavior, which has no separate format flag --
/// the presence of `-o` alone decides JSON vs. text.
pub fn emit_patterns(patterns: &[Pattern], diagram: &Diagram, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => write_json(&patterns_to_json(patterns, diagram), path),
        None => {
            println!("{}", format_patterns_text(patterns, diagram));
            Ok(())
        }
    }
}

pub fn emit_cycles(cycles: &[&Cycle], diagram: &Diagram, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => write_json(&cycles_to_json(cycles, diagram), path),
        None => {
            println!("Dependency cycles: {}", cycles.len());
            println!("{}", format_cycles_text(cycles, diagram));
            Ok(())
        }
    }
}

pub fn emit_metrics(values: &[MetricValue], output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => write_json(&metrics_to_json(values), path),
        None => {
            println!("{}", format_metrics_text(values));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_path_yields_empty_map() {
        let config = load_metric_config(None).unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn format_number_uses_inf_for_infinite_ratios() {
        assert_eq!(format_number(f64::INFINITY, false), "inf");
        assert_eq!(format_number(3.0, true), "3");
        assert_eq!(format_number(3.14159, false), "3.14");
    }
}
