use covalent_schema::{
    compile, meta_shape, ObjectShape, SchemaError, Shape, ShapeRef, LABEL_FIELD, META_SHAPE_NAME,
    SCHEMA_FIELD,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn todo() -> ObjectShape {
    ObjectShape::new()
        .required("title", Shape::string())
        .optional("done", Shape::boolean())
}

#[test]
fn rejects_non_object_description() {
    let err = compile(&Shape::list_of(Shape::string())).unwrap_err();
    assert_eq!(err, SchemaError::NotAnObject("list_of"));

    let err = compile(&Shape::string()).unwrap_err();
    assert_eq!(err, SchemaError::NotAnObject("scalar"));
}

#[test]
fn flat_shape_passes_through() {
    let compiled = compile(&Shape::object(todo())).unwrap();
    assert!(compiled.is_flat());
    assert_eq!(compiled.root.field("title"), todo().field("title"));
    assert_eq!(compiled.root.field("done"), todo().field("done"));
}

#[test]
fn system_fields_are_injected_and_optional() {
    let compiled = compile(&Shape::object(todo())).unwrap();

    let label = compiled.root.field(LABEL_FIELD).unwrap();
    assert_eq!(label.shape, Shape::string());
    assert!(!label.required);

    let schema = compiled.root.field(SCHEMA_FIELD).unwrap();
    assert_eq!(schema.shape, Shape::named(META_SHAPE_NAME));
    assert!(!schema.required);

    let required: Vec<&str> = compiled.root.required_fields().collect();
    assert_eq!(required, vec!["title"]);
}

#[test]
fn caller_supplied_system_fields_lose_required() {
    let shape = todo().required(LABEL_FIELD, Shape::string());
    let compiled = compile(&Shape::object(shape)).unwrap();
    assert!(!compiled.root.field(LABEL_FIELD).unwrap().required);
}

#[test]
fn meta_shape_short_circuits() {
    let compiled = compile(&Shape::object(meta_shape())).unwrap();
    assert!(compiled.is_flat());
    assert!(compiled.root.field("name").unwrap().required);
    assert!(compiled.root.field("definition").unwrap().required);
}

#[test]
fn nested_object_is_extracted() {
    let human = ObjectShape::new()
        .required("name", Shape::string())
        .optional(
            "avatar",
            Shape::object(
                ObjectShape::new()
                    .required("url", Shape::string())
                    .optional("width", Shape::integer()),
            ),
        );
    let compiled = compile(&Shape::object(human)).unwrap();

    assert_eq!(compiled.extracted.len(), 1);
    let avatar = &compiled.extracted[0];
    assert_eq!(avatar.path, "avatar");
    assert!(avatar.shape.field("url").unwrap().required);
    assert!(avatar.shape.field(SCHEMA_FIELD).is_some());

    let field = compiled.root.field("avatar").unwrap();
    assert!(!field.required);
    assert_eq!(
        field.shape,
        Shape::Reference {
            to: ShapeRef::Path("avatar".into())
        }
    );
}

#[test]
fn list_elements_use_items_segment() {
    let todo_list = ObjectShape::new().optional(
        "subtasks",
        Shape::list_of(Shape::object(ObjectShape::new().required("title", Shape::string()))),
    );
    let compiled = compile(&Shape::object(todo_list)).unwrap();

    assert_eq!(compiled.extracted.len(), 1);
    assert_eq!(compiled.extracted[0].path, "subtasks/items");
    assert_eq!(
        compiled.root.field("subtasks").unwrap().shape,
        Shape::list_of(Shape::Reference {
            to: ShapeRef::Path("subtasks/items".into())
        })
    );
}

#[test]
fn children_are_extracted_before_parents() {
    let shape = ObjectShape::new().optional(
        "a",
        Shape::object(ObjectShape::new().optional(
            "b",
            Shape::stream_of(Shape::object(
                ObjectShape::new().optional("c", Shape::object(ObjectShape::new())),
            )),
        )),
    );
    let compiled = compile(&Shape::object(shape)).unwrap();
    let paths: Vec<&str> = compiled.extracted.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["a/b/items/c", "a/b/items", "a"]);

    let middle = &compiled.extracted[1].shape;
    assert_eq!(
        middle.field("c").unwrap().shape,
        Shape::Reference {
            to: ShapeRef::Path("a/b/items/c".into())
        }
    );
}

#[test]
fn references_pass_through_untouched() {
    let shape = ObjectShape::new()
        .optional("author", Shape::named("Human"))
        .optional("parent", Shape::itself());
    let compiled = compile(&Shape::object(shape)).unwrap();
    assert!(compiled.is_flat());
    assert_eq!(compiled.root.field("author").unwrap().shape, Shape::named("Human"));
    assert_eq!(compiled.root.field("parent").unwrap().shape, Shape::itself());
}

#[test]
fn definition_json_round_trips() {
    let shape = Shape::object(
        ObjectShape::new()
            .required("title", Shape::string())
            .optional("tags", Shape::list_of(Shape::string())),
    );
    let json = serde_json::to_value(&shape).unwrap();
    assert_eq!(json["kind"], "object");
    assert_eq!(json["fields"]["title"]["kind"], "scalar");
    assert_eq!(json["fields"]["title"]["required"], true);
    assert_eq!(json["fields"]["tags"]["items"]["scalar"], "string");
    let back: Shape = serde_json::from_value(json).unwrap();
    assert_eq!(back, shape);
}

// ── Properties ───────────────────────────────────────────────────

fn arb_shape() -> impl Strategy<Value = Shape> {
    let leaf = prop_oneof![
        Just(Shape::string()),
        Just(Shape::integer()),
        Just(Shape::boolean()),
        Just(Shape::named("Other")),
    ];
    leaf.prop_recursive(4, 24, 4, |inner| {
        prop_oneof![
            inner.clone().prop_map(Shape::list_of),
            inner.clone().prop_map(Shape::stream_of),
            prop::collection::btree_map("[a-d]", (inner, any::<bool>()), 0..4).prop_map(
                |fields| {
                    let mut object = ObjectShape::new();
                    for (name, (shape, required)) in fields {
                        object = if required {
                            object.required(name, shape)
                        } else {
                            object.optional(name, shape)
                        };
                    }
                    Shape::object(object)
                }
            ),
        ]
    })
}

fn path_refs(shape: &ObjectShape) -> Vec<String> {
    shape
        .references()
        .into_iter()
        .filter_map(|r| match r {
            ShapeRef::Path(p) => Some(p.clone()),
            _ => None,
        })
        .collect()
}

proptest! {
    #[test]
    fn compiled_shapes_embed_no_objects(shape in arb_shape()) {
        let root = Shape::object(ObjectShape::new().optional("x", shape));
        let compiled = compile(&root).unwrap();
        prop_assert!(!compiled.root.has_nested_objects());
        for extracted in &compiled.extracted {
            prop_assert!(!extracted.shape.has_nested_objects());
        }
    }

    #[test]
    fn placeholders_point_at_earlier_extractions(shape in arb_shape()) {
        let root = Shape::object(ObjectShape::new().optional("x", shape));
        let compiled = compile(&root).unwrap();
        let mut seen: Vec<String> = Vec::new();
        for extracted in &compiled.extracted {
            for path in path_refs(&extracted.shape) {
                prop_assert!(seen.contains(&path), "{} referenced before extraction", path);
            }
            seen.push(extracted.path.clone());
        }
        for path in path_refs(&compiled.root) {
            prop_assert!(seen.contains(&path));
        }
    }
}
