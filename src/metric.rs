use std::collections::{HashMap, HashSet};

use crate::cycle::CycleFinder;
use crate::model::{Diagram, Id};
use crate::pattern::{PatternFinder, PatternKind};

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if numerator <= f64::EPSILON {
        0.0
    } else if denominator <= f64::EPSILON {
        f64::INFINITY
    } else {
        numerator / denominator
    }
}

fn pascal_to_snake(s: &str) -> String {
    let mut out = String::new();
    for (i, ch) in s.char_indices() {
        if ch.is_uppercase() && i != 0 {
            out.push('_');
        }
        out.extend(ch.to_lowercase());
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Packages,
    Classes,
    PatternTypes,
    ClassesInPattern,
    ClassesInPatternRatio,
    MethodInstances,
    AvgMethodsPerClass,
    RelationshipInstances,
    AvgRelationshipsPerClass,
    AvgInheritanceDepth,
    DependencyCycles,
    ClassesInCycle,
    ClassesInCycleRatio,
    RemediationCost,
    DevelopmentCost,
    TechnicalDebtRatio,
}

impl MetricKind {
    pub const ALL: [MetricKind; 16] = [
        MetricKind::Packages,
        MetricKind::Classes,
        MetricKind::PatternTypes,
        MetricKind::ClassesInPattern,
        MetricKind::ClassesInPatternRatio,
        MetricKind::MethodInstances,
        MetricKind::AvgMethodsPerClass,
        MetricKind::RelationshipInstances,
        MetricKind::AvgRelationshipsPerClass,
        MetricKind::AvgInheritanceDepth,
        MetricKind::DependencyCycles,
        MetricKind::ClassesInCycle,
        MetricKind::ClassesInCycleRatio,
        MetricKind::RemediationCost,
        MetricKind::DevelopmentCost,
        MetricKind::TechnicalDebtRatio,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MetricKind::Packages => "Packages",
            MetricKind::Classes => "Classes",
            MetricKind::PatternTypes => "PatternTypes",
            MetricKind::ClassesInPattern => "ClassesInPattern",
            MetricKind::ClassesInPatternRatio => "ClassesInPatternRatio",
            MetricKind::MethodInstances => "MethodInstances",
            MetricKind::AvgMethodsPerClass => "AvgMethodsPerClass",
            MetricKind::RelationshipInstances => "RelationshipInstances",
            MetricKind::AvgRelationshipsPerClass => "AvgRelationshipsPerClass",
            MetricKind::AvgInheritanceDepth => "AvgInheritanceDepth",
            MetricKind::DependencyCycles => "DependencyCycles",
            MetricKind::ClassesInCycle => "ClassesInCycle",
            MetricKind::ClassesInCycleRatio => "ClassesInCycleRatio",
            MetricKind::RemediationCost => "RemediationCost",
            MetricKind::DevelopmentCost => "DevelopmentCost",
            MetricKind::TechnicalDebtRatio => "TechnicalDebtRatio",
        }
    }

    pub fn identifier(self) -> String {
        pascal_to_snake(self.name())
    }

    /// Counts format without a decimal point; ratios, averages, and
    /// costs always print with two decimal places.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            MetricKind::Packages
                | MetricKind::Classes
                | MetricKind::PatternTypes
                | MetricKind::ClassesInPattern
                | MetricKind::MethodInstances
                | MetricKind::RelationshipInstances
                | MetricKind::DependencyCycles
                | MetricKind::ClassesInCycle
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricValue {
    pub kind: MetricKind,
    pub value: f64,
}

/// Wires the diagram, cycle finder, and pattern finder together to
/// compute every metric, including the two config-driven cost metrics.
pub struct MetricAggregator<'d> {
    diagram: &'d Diagram,
    cycles: CycleFinder<'d>,
    patterns: PatternFinder<'d>,
    config: HashMap<String, f64>,
}

impl<'d> MetricAggregator<'d> {
    pub fn new(diagram: &'d Diagram, config: HashMap<String, f64>) -> Self {
        MetricAggregator {
            diagram,
            cycles: CycleFinder::new(diagram),
            patterns: PatternFinder::new(diagram),
            config,
        }
    }

    fn classes_in_pattern(&self) -> f64 {
        let patterns = self.patterns.patterns(None, None);
        let set: HashSet<&Id> = patterns.iter().flat_map(|p| p.involved_classes()).collect();
        set.len() as f64
    }

    fn pattern_types(&self) -> f64 {
        let kinds: HashSet<PatternKind> = self.patterns.patterns(None, None).iter().map(|p| p.kind()).collect();
        kinds.len() as f64
    }

    fn classes_in_cycle(&self) -> f64 {
        let set: HashSet<&Id> = self.cycles.cycles().iter().flat_map(|c| c.classes.iter()).collect();
        set.len() as f64
    }

    fn method_instances(&self) -> f64 {
        self.diagram.classes(false).map(|c| self.diagram.methods(&c.id).len() as f64).sum()
    }

    fn relationship_instances(&self) -> f64 {
        self.diagram
            .classes(false)
            .map(|c| self.diagram.relationships(&c.id, None, crate::model::Role::Any, None).len() as f64)
            .sum()
    }

    fn avg_inheritance_depth(&self) -> f64 {
        let leaves = self.diagram.leaf_classes(true);
        if leaves.is_empty() {
            return 0.0;
        }
        let total: usize = leaves.iter().map(|c| self.diagram.inheritance_depth(&c.id)).sum();
        total as f64 / leaves.len() as f64
    }

    /// The thirteen metrics that are not themselves derived from a
    /// config-driven cost, keyed by identifier so `RemediationCost`
    /// can look weighted contributions up by name.
    fn base_metric_values(&self) -> HashMap<String, f64> {
        let classes = self.diagram.class_count() as f64;
        let method_instances = self.method_instances();
        let relationship_instances = self.relationship_instances();
        let classes_in_pattern = self.classes_in_pattern();
        let classes_in_cycle = self.classes_in_cycle();
        let dependency_cycles = self.cycles.cycles().len() as f64;

        let mut values = HashMap::new();
        values.insert(MetricKind::Packages.identifier(), self.diagram.package_count() as f64);
        values.insert(MetricKind::Classes.identifier(), classes);
        values.insert(MetricKind::PatternTypes.identifier(), self.pattern_types());
        values.insert(MetricKind::ClassesInPattern.identifier(), classes_in_pattern);
        values.insert(MetricKind::ClassesInPatternRatio.identifier(), ratio(classes_in_pattern, classes));
        values.insert(MetricKind::MethodInstances.identifier(), method_instances);
        values.insert(MetricKind::AvgMethodsPerClass.identifier(), ratio(method_instances, classes));
        values.insert(MetricKind::RelationshipInstances.identifier(), relationship_instances);
        values.insert(MetricKind::AvgRelationshipsPerClass.identifier(), ratio(relationship_instances, classes));
        values.insert(MetricKind::AvgInheritanceDepth.identifier(), self.avg_inheritance_depth());
        values.insert(MetricKind::DependencyCycles.identifier(), dependency_cycles);
        values.insert(MetricKind::ClassesInCycle.identifier(), classes_in_cycle);
        values.insert(MetricKind::ClassesInCycleRatio.identifier(), ratio(classes_in_cycle, classes));
        values
    }

    fn remediation_cost(&self, base: &HashMap<String, f64>) -> f64 {
        self.config
            .iter()
            .filter_map(|(identifier, weight)| base.get(identifier).map(|value| value * weight))
            .sum()
    }

    fn development_cost(&self) -> f64 {
        *self.config.get(&MetricKind::DevelopmentCost.identifier()).unwrap_or(&0.0)
    }

    /// Every metric in `MetricKind::ALL` order.
    pub fn compute(&self) -> Vec<MetricValue> {
        let base = self.base_metric_values();
        let remediation_cost = self.remediation_cost(&base);
        let development_cost = self.development_cost();
        let technical_debt_ratio = ratio(remediation_cost, development_cost);

        MetricKind::ALL
            .into_iter()
            .map(|kind| {
                let value = match kind {
                    MetricKind::RemediationCost => remediation_cost,
                    MetricKind::DevelopmentCost => development_cost,
                    MetricKind::TechnicalDebtRatio => technical_debt_ratio,
                    other => *base.get(&other.identifier()).expect("base metric computed above"),
                };
                MetricValue { kind, value }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_is_snake_case() {
        assert_eq!(MetricKind::ClassesInPatternRatio.identifier(), "classes_in_pattern_ratio");
        assert_eq!(MetricKind::Classes.identifier(), "classes");
    }

    #[test]
    fn empty_diagram_yields_zeroed_metrics() {
        let d = Diagram::new();
        let agg = MetricAggregator::new(&d, HashMap::new());
        let values = agg.compute();
        let classes = values.iter().find(|v| v.kind == MetricKind::Classes).unwrap();
        assert_eq!(classes.value, 0.0);
        let ratio_metric = values.iter().find(|v| v.kind == MetricKind::ClassesInPatternRatio).unwrap();
        assert_eq!(ratio_metric.value, 0.0);
        let depth = values.iter().find(|v| v.kind == MetricKind::AvgInheritanceDepth).unwrap();
        assert_eq!(depth.value, 0.0);
    }

    #[test]
    fn ratio_returns_infinity_for_zero_denominator_with_positive_numerator() {
        assert_eq!(ratio(1.0, 0.0), f64::INFINITY);
        assert_eq!(ratio(0.0, 0.0), 0.0);
        assert_eq!(ratio(0.0, 5.0), 0.0);
    }

    #[test]
    fn remediation_cost_only_counts_configured_identifiers() {
        let mut d = Diagram::new();
        d.add_class("A".into(), "A".into(), false, None).unwrap();
        let mut config = HashMap::new();
        config.insert("classes".to_string(), 2.0);
        config.insert("unknown_metric".to_string(), 99.0);
        let agg = MetricAggregator::new(&d, config);
        let values = agg.compute();
        let remediation = values.iter().find(|v| v.kind == MetricKind::RemediationCost).unwrap();
        assert_eq!(remediation.value, 2.0);
    }
}
