use covalent_engine::{
    builtin_shapes, dependency_order, BuiltinShape, EngineError, CAPABILITIES_SHAPE, HUMAN_SHAPE,
    INBOX_SHAPE, MESSAGE_SHAPE, OPERATING_SYSTEM_SHAPE, SPARK_SHAPE,
};
use covalent_schema::{ObjectShape, Shape};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn referencing(name: &str, targets: &[&str]) -> BuiltinShape {
    let mut shape = ObjectShape::new();
    for target in targets {
        shape = shape.optional(format!("to_{target}"), Shape::named(*target));
    }
    BuiltinShape::new(name, shape)
}

fn names(order: &[&BuiltinShape]) -> Vec<String> {
    order.iter().map(|s| s.name.clone()).collect()
}

#[test]
fn builtins_sort_deterministically() {
    let builtins = builtin_shapes();
    let order = dependency_order(&builtins).unwrap();
    assert_eq!(
        names(&order),
        vec![
            CAPABILITIES_SHAPE,
            MESSAGE_SHAPE,
            INBOX_SHAPE,
            HUMAN_SHAPE,
            OPERATING_SYSTEM_SHAPE,
            SPARK_SHAPE,
        ]
    );
}

#[test]
fn self_and_meta_references_are_not_dependencies() {
    let shape = referencing("Node", &["Node", "@meta"]);
    assert!(shape.dependencies().is_empty());
    assert_eq!(names(&dependency_order(&[shape]).unwrap()), vec!["Node"]);
}

#[test]
fn external_references_are_ignored() {
    let shapes = [referencing("Note", &["Person"])];
    assert_eq!(names(&dependency_order(&shapes).unwrap()), vec!["Note"]);
}

#[test]
fn dependencies_come_first() {
    let shapes = [
        referencing("A", &["B", "C"]),
        referencing("B", &["C"]),
        referencing("C", &[]),
    ];
    assert_eq!(names(&dependency_order(&shapes).unwrap()), vec!["C", "B", "A"]);
}

#[test]
fn cycles_are_rejected() {
    let shapes = [
        referencing("A", &["B"]),
        referencing("B", &["A"]),
        referencing("C", &[]),
    ];
    let err = dependency_order(&shapes).unwrap_err();
    assert_eq!(err, EngineError::DependencyCycle(vec!["A".into(), "B".into()]));
}

proptest! {
    /// Edges only point from higher to lower indices, so the graph is
    /// acyclic; every shape must land after all of its dependencies.
    #[test]
    fn order_respects_every_edge(
        edges in prop::collection::vec(prop::collection::vec(any::<bool>(), 8), 8),
    ) {
        let names: Vec<String> = (0..8).map(|i| format!("S{i}")).collect();
        let shapes: Vec<BuiltinShape> = (0..8)
            .map(|i| {
                let targets: Vec<&str> = (0..i)
                    .filter(|j| edges[i][*j])
                    .map(|j| names[j].as_str())
                    .collect();
                referencing(&names[i], &targets)
            })
            .collect();

        let order = dependency_order(&shapes).unwrap();
        prop_assert_eq!(order.len(), shapes.len());
        let position = |name: &str| order.iter().position(|s| s.name == name).unwrap();
        for shape in &shapes {
            for dep in shape.dependencies() {
                prop_assert!(position(&dep) < position(&shape.name));
            }
        }
    }
}
