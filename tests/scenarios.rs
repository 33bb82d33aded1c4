use umlens::cycle::CycleFinder;
use umlens::metric::{MetricAggregator, MetricKind};
use umlens::model::{AggKind, Attribute, Diagram, Method, Multiplicity, Parameter, RelKind, Relationship, Role, Scope};
use umlens::pattern::{Pattern, PatternFinder, PatternKind};

fn class(d: &mut Diagram, id: &str) {
    d.add_class(id.to_string(), id.to_string(), false, None).unwrap();
}

fn interface(d: &mut Diagram, id: &str) {
    d.add_stereotype("Interface".to_string(), "Interface".to_string()).ok();
    d.add_class(id.to_string(), id.to_string(), false, None).unwrap();
    d.set_class_stereotypes(id, vec!["Interface".to_string()]).unwrap();
}

fn dependency(d: &mut Diagram, id: &str, from: &str, to: &str) {
    d.add_relationship(Relationship {
        id: id.into(),
        kind: RelKind::Dependency,
        from_cls: from.into(),
        to_cls: to.into(),
        stereotypes: vec![],
        aggregation: None,
        from_mult: None,
        to_mult: None,
    })
    .unwrap();
}

fn realizes(d: &mut Diagram, id: &str, from: &str, to: &str) {
    d.add_relationship(Relationship {
        id: id.into(),
        kind: RelKind::Realization,
        from_cls: from.into(),
        to_cls: to.into(),
        stereotypes: vec![],
        aggregation: None,
        from_mult: None,
        to_mult: None,
    })
    .unwrap();
}

// S1: Interface I with one realization A; A depends non-creationally on
// a plain class B that has no outgoing edges.
#[test]
fn s1_single_adapter() {
    let mut d = Diagram::new();
    interface(&mut d, "I");
    class(&mut d, "A");
    class(&mut d, "B");
    realizes(&mut d, "r1", "A", "I");
    dependency(&mut d, "r2", "A", "B");

    let finder = PatternFinder::new(&d);
    let found = finder.patterns(None, None);
    assert_eq!(found.len(), 1);
    assert_eq!(
        found[0],
        Pattern::Adapter { target: "I".into(), adapter: "A".into(), adaptee: "B".into() }
    );
}

// S2: Class C with a class-scope self-typed attribute and a
// parameterless class-scope method returning C.
#[test]
fn s2_singleton() {
    let mut d = Diagram::new();
    class(&mut d, "C");
    d.set_class_attributes(
        "C",
        vec![Attribute { name: "instance".into(), datatype: "C".into(), scope: Scope::Class }],
    )
    .unwrap();
    d.set_class_methods(
        "C",
        vec![Method {
            name: "getInstance".into(),
            scope: Scope::Class,
            return_type: Some("C".into()),
            parameters: vec![],
            abstract_: false,
        }],
    )
    .unwrap();

    let found = PatternFinder::new(&d).patterns(None, None);
    assert_eq!(found.len(), 1);
    assert_eq!(
        found[0],
        Pattern::Singleton { singleton: "C".into(), attribute: "instance".into(), method: "getInstance".into() }
    );
}

// S3: A -> B -> C -> A via Dependency edges.
#[test]
fn s3_three_class_cycle() {
    let mut d = Diagram::new();
    for n in ["A", "B", "C"] {
        class(&mut d, n);
    }
    dependency(&mut d, "r1", "A", "B");
    dependency(&mut d, "r2", "B", "C");
    dependency(&mut d, "r3", "C", "A");

    let finder = CycleFinder::new(&d);
    let cycles = finder.cycles();
    assert_eq!(cycles.len(), 1);
    let cycle = cycles.iter().next().unwrap();
    assert_eq!(cycle.len(), 3);

    let agg = MetricAggregator::new(&d, Default::default());
    let values = agg.compute();
    let dep_cycles = values.iter().find(|v| v.kind == MetricKind::DependencyCycles).unwrap();
    assert_eq!(dep_cycles.value, 1.0);
    let classes_in_cycle = values.iter().find(|v| v.kind == MetricKind::ClassesInCycle).unwrap();
    assert_eq!(classes_in_cycle.value, 3.0);
}

// S4: Facade needs strictly more than two outgoing dependencies.
#[test]
fn s4_facade_needs_more_than_two_dependencies() {
    let mut d = Diagram::new();
    for n in ["F", "D1", "D2", "D3"] {
        class(&mut d, n);
    }
    dependency(&mut d, "r1", "F", "D1");
    dependency(&mut d, "r2", "F", "D2");
    assert!(PatternFinder::new(&d).patterns(None, Some(PatternKind::Facade)).is_empty());

    dependency(&mut d, "r3", "F", "D3");
    let found = PatternFinder::new(&d).patterns(None, Some(PatternKind::Facade));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0], Pattern::Facade { facade: "F".into(), dependencies: vec!["D1".into(), "D2".into(), "D3".into()] });
}

// S5: Interface P with a `clone(): P` method, realized by P1 and P2.
#[test]
fn s5_prototype() {
    let mut d = Diagram::new();
    interface(&mut d, "P");
    class(&mut d, "P1");
    class(&mut d, "P2");
    d.set_class_methods(
        "P",
        vec![Method { name: "clone".into(), scope: Scope::Instance, return_type: Some("P".into()), parameters: vec![], abstract_: true }],
    )
    .unwrap();
    realizes(&mut d, "r1", "P1", "P");
    realizes(&mut d, "r2", "P2", "P");

    let found = PatternFinder::new(&d).patterns(None, Some(PatternKind::Prototype));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0], Pattern::Prototype { prototype: "P".into(), concrete_prototypes: vec!["P1".into(), "P2".into()] });
}

// S6: interface Comp realized by Leaf1, Leaf2, Comp2; Comp2 is
// associated to Comp (composited, 1 -> 0..*).
#[test]
fn s6_composite() {
    let mut d = Diagram::new();
    interface(&mut d, "Comp");
    class(&mut d, "Leaf1");
    class(&mut d, "Leaf2");
    class(&mut d, "Comp2");
    realizes(&mut d, "r1", "Leaf1", "Comp");
    realizes(&mut d, "r2", "Leaf2", "Comp");
    realizes(&mut d, "r3", "Comp2", "Comp");
    d.add_relationship(Relationship {
        id: "a1".into(),
        kind: RelKind::Association,
        from_cls: "Comp2".into(),
        to_cls: "Comp".into(),
        stereotypes: vec![],
        aggregation: Some(AggKind::Composited),
        from_mult: Some(Multiplicity::One),
        to_mult: Some(Multiplicity::Star),
    })
    .unwrap();

    let found = PatternFinder::new(&d).patterns(None, Some(PatternKind::Composite));
    assert_eq!(found.len(), 1);
    assert_eq!(
        found[0],
        Pattern::Composite { composite: "Comp2".into(), component: "Comp".into(), leaves: vec!["Leaf1".into(), "Leaf2".into()] }
    );
}

// Invariant: every relationship is indexed on both endpoints.
#[test]
fn invariant_relationship_indexed_both_ways() {
    let mut d = Diagram::new();
    class(&mut d, "A");
    class(&mut d, "B");
    dependency(&mut d, "r1", "A", "B");
    assert_eq!(d.relationships("A", None, Role::Any, None).len(), 1);
    assert_eq!(d.relationships("B", None, Role::Any, None).len(), 1);
}

// Invariant: realizations is empty for a non-interface class.
#[test]
fn invariant_realizations_empty_for_non_interface() {
    let mut d = Diagram::new();
    class(&mut d, "A");
    class(&mut d, "B");
    realizes(&mut d, "r1", "A", "B");
    assert!(d.realizations("B").is_empty());
}

// Invariant: an isolated class has zero inheritance depth and is not
// part of any cycle.
#[test]
fn invariant_isolated_class_has_no_depth_or_cycle() {
    let mut d = Diagram::new();
    class(&mut d, "Solo");
    assert_eq!(d.inheritance_depth("Solo"), 0);
    let finder = CycleFinder::new(&d);
    assert!(finder.cycles().iter().all(|c| !c.classes.contains(&"Solo".to_string())));
}

// Idempotence: re-querying cycles and patterns returns identical results.
#[test]
fn idempotence_of_memoised_finders() {
    let mut d = Diagram::new();
    for n in ["A", "B"] {
        class(&mut d, n);
    }
    dependency(&mut d, "r1", "A", "B");
    dependency(&mut d, "r2", "B", "A");

    let cycle_finder = CycleFinder::new(&d);
    let first: Vec<_> = cycle_finder.cycles().iter().cloned().collect();
    let second: Vec<_> = cycle_finder.cycles().iter().cloned().collect();
    assert_eq!(first.len(), second.len());

    let pattern_finder = PatternFinder::new(&d);
    assert_eq!(pattern_finder.patterns(None, None), pattern_finder.patterns(None, None));
}

// Boundary: a ratio with a zero numerator is zero; a positive
// numerator over a zero denominator is +infinity.
#[test]
fn boundary_ratio_semantics_via_technical_debt_ratio() {
    let mut d = Diagram::new();
    class(&mut d, "A");
    let mut config = std::collections::HashMap::new();
    config.insert("classes".to_string(), 1.0);
    let agg = MetricAggregator::new(&d, config);
    let values = agg.compute();
    let debt = values.iter().find(|v| v.kind == MetricKind::TechnicalDebtRatio).unwrap();
    assert_eq!(debt.value, f64::INFINITY);
}

// Boundary: an empty diagram yields zero classes, zero ratios, and
// empty pattern/cycle sets.
#[test]
fn boundary_empty_diagram() {
    let d = Diagram::new();
    let agg = MetricAggregator::new(&d, Default::default());
    let values = agg.compute();
    assert_eq!(values.iter().find(|v| v.kind == MetricKind::Classes).unwrap().value, 0.0);
    assert_eq!(values.iter().find(|v| v.kind == MetricKind::AvgInheritanceDepth).unwrap().value, 0.0);
    assert!(PatternFinder::new(&d).patterns(None, None).is_empty());
    assert!(CycleFinder::new(&d).cycles().is_empty());
}

#[allow(dead_code)]
fn unused(_: Parameter) {}
