//! Built-in shapes and their creation order.

use crate::error::{EngineError, EngineResult};
use covalent_schema::{ObjectShape, Shape, META_SHAPE_NAME};
use std::collections::{BTreeMap, BTreeSet};

pub const CAPABILITIES_SHAPE: &str = "Capabilities";
pub const OPERATING_SYSTEM_SHAPE: &str = "OperatingSystem";
pub const SPARK_SHAPE: &str = "Spark";
pub const HUMAN_SHAPE: &str = "Human";
pub const MESSAGE_SHAPE: &str = "Message";
pub const INBOX_SHAPE: &str = "Inbox";

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinShape {
    pub name: String,
    pub shape: ObjectShape,
}

impl BuiltinShape {
    #[must_use]
    pub fn new(name: impl Into<String>, shape: ObjectShape) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }

    /// Other shapes this one must be created after. Self-references and
    /// the meta-shape are left out.
    #[must_use]
    pub fn dependencies(&self) -> BTreeSet<String> {
        let mut deps = self.shape.named_dependencies();
        deps.remove(&self.name);
        deps.remove(META_SHAPE_NAME);
        deps
    }
}

/// The shapes every bootstrapped store starts with.
#[must_use]
pub fn builtin_shapes() -> Vec<BuiltinShape> {
    vec![
        BuiltinShape::new(
            CAPABILITIES_SHAPE,
            ObjectShape::new().required("guardian", Shape::string()),
        ),
        BuiltinShape::new(
            OPERATING_SYSTEM_SHAPE,
            ObjectShape::new()
                .required("schemas", Shape::list_of(Shape::named(META_SHAPE_NAME)))
                .required("schema_names", Shape::json())
                .required("indexes", Shape::json())
                .required("apps", Shape::json()),
        ),
        BuiltinShape::new(
            SPARK_SHAPE,
            ObjectShape::new()
                .required("name", Shape::string())
                .required("guardian", Shape::string())
                .required("os", Shape::named(OPERATING_SYSTEM_SHAPE))
                .required("capabilities", Shape::named(CAPABILITIES_SHAPE)),
        ),
        BuiltinShape::new(
            HUMAN_SHAPE,
            ObjectShape::new()
                .required("name", Shape::string())
                .optional(
                    "avatar",
                    Shape::object(
                        ObjectShape::new()
                            .required("url", Shape::string())
                            .optional("width", Shape::integer())
                            .optional("height", Shape::integer()),
                    ),
                )
                .optional("inbox", Shape::named(INBOX_SHAPE)),
        ),
        BuiltinShape::new(
            MESSAGE_SHAPE,
            ObjectShape::new()
                .required("body", Shape::string())
                .optional("sender", Shape::string())
                .optional("sent_at", Shape::integer())
                .optional("reply_to", Shape::named(MESSAGE_SHAPE)),
        ),
        BuiltinShape::new(
            INBOX_SHAPE,
            ObjectShape::new()
                .optional("title", Shape::string())
                .required("messages", Shape::stream_of(Shape::named(MESSAGE_SHAPE))),
        ),
    ]
}

/// Orders shapes so each comes after everything it references.
///
/// Kahn's algorithm; among shapes that are ready at the same time the
/// smallest name goes first, so the order is deterministic. References to
/// shapes outside the set are assumed to exist already.
///
/// # Errors
///
/// [`EngineError::DependencyCycle`] listing the shapes that could not be
/// ordered.
pub fn dependency_order(shapes: &[BuiltinShape]) -> EngineResult<Vec<&BuiltinShape>> {
    let by_name: BTreeMap<&str, &BuiltinShape> =
        shapes.iter().map(|s| (s.name.as_str(), s)).collect();

    let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
    for shape in shapes {
        let deps: Vec<String> = shape
            .dependencies()
            .into_iter()
            .filter(|dep| by_name.contains_key(dep.as_str()))
            .collect();
        in_degree.insert(shape.name.as_str(), deps.len());
        for dep in deps {
            dependents.entry(dep).or_default().insert(shape.name.as_str());
        }
    }

    let mut queue: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| *name)
        .collect();

    let mut ordered = Vec::with_capacity(shapes.len());
    while let Some(first) = queue.pop_first() {
        if let Some(shape) = by_name.get(first) {
            ordered.push(*shape);
        }
        let Some(waiting) = dependents.get(first) else {
            continue;
        };
        for dependent in waiting {
            let Some(degree) = in_degree.get_mut(dependent) else {
                continue;
            };
            *degree = degree.saturating_sub(1);
            if *degree == 0 {
                queue.insert(*dependent);
            }
        }
    }

    if ordered.len() < by_name.len() {
        let placed: BTreeSet<&str> = ordered.iter().map(|s| s.name.as_str()).collect();
        let stuck = by_name
            .keys()
            .filter(|name| !placed.contains(*name))
            .map(|name| (*name).to_string())
            .collect();
        return Err(EngineError::DependencyCycle(stuck));
    }
    Ok(ordered)
}
