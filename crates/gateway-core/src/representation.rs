//! # Representation Extractor (§4.3)
//!
//! Walks the shared root data tree along a step's `insertionPath`, and at
//! each entity object found there builds a `{__typename, ...key fields}`
//! representation for `_entities`. Grounded in the teacher's
//! `task::TaskContext::get_node_data` / `get_event_data` path-lookup
//! pattern, generalized from a flat key lookup to a path walk that may
//! fan out across list elements.

use serde_json::{Map, Value};

use crate::error::{GatewayError, Result};
use crate::plan::{Step, StepId};
use crate::supergraph::SupergraphView;

/// One entity object located along the insertion path, together with the
/// response-path coordinates needed to stitch the corresponding `_entities`
/// result back in (spec §4.4: "recorded alongside each representation").
#[derive(Debug, Clone)]
pub struct LocatedEntity {
    /// The representation to send: `{"__typename": T, key fields...}`.
    pub representation: Value,
    /// Indices into any list levels crossed while walking the insertion
    /// path, outermost first. Empty when the path never passed through a
    /// list.
    pub list_indices: Vec<usize>,
}

/// Walk `root_data` along `step.insertion_path`, collecting one
/// [`LocatedEntity`] per entity object found (spec §4.3). Fans out across
/// list elements at every path segment that resolves to an array.
pub fn extract_representations(
    step: &Step,
    root_data: &Value,
    supergraph: &dyn SupergraphView,
) -> Result<Vec<LocatedEntity>> {
    let parent_type = step
        .parent_type
        .as_deref()
        .ok_or_else(|| GatewayError::QueryBuildError {
            step: step.id,
            message: "entity-fetch step has no parentType".to_string(),
        })?;

    let entity = supergraph
        .entity(parent_type)
        .ok_or_else(|| GatewayError::QueryBuildError {
            step: step.id,
            message: format!("{} is not a known entity type", parent_type),
        })?;
    let key = entity.primary_key().ok_or_else(|| GatewayError::QueryBuildError {
        step: step.id,
        message: format!("entity {} declares no usable key", parent_type),
    })?;

    let mut located = Vec::new();
    walk(root_data, &step.insertion_path, &mut Vec::new(), &mut |node, indices| {
        if let Some(object) = node.as_object() {
            if let Some(representation) = build_representation(object, parent_type, &key.field_set) {
                located.push(LocatedEntity {
                    representation,
                    list_indices: indices.to_vec(),
                });
            }
        }
    });

    if located.is_empty() {
        return Err(GatewayError::EmptyRepresentations { step: step.id });
    }

    Ok(located)
}

/// Recursively descend `node` by `path`, fanning out across arrays at every
/// segment, and invoke `visit` once the path is exhausted.
fn walk(
    node: &Value,
    path: &[String],
    indices: &mut Vec<usize>,
    visit: &mut impl FnMut(&Value, &[usize]),
) {
    match path.split_first() {
        None => visit(node, indices),
        Some((head, rest)) => match node {
            Value::Object(object) => {
                if let Some(next) = object.get(head) {
                    descend_through_lists(next, rest, indices, visit);
                }
            }
            Value::Array(items) => {
                // The insertion path segment names a field on each element
                // of an already-entered list; re-apply the same segment to
                // every element.
                for (i, item) in items.iter().enumerate() {
                    indices.push(i);
                    walk(item, path, indices, visit);
                    indices.pop();
                }
            }
            _ => {}
        },
    }
}

fn descend_through_lists(
    node: &Value,
    rest: &[String],
    indices: &mut Vec<usize>,
    visit: &mut impl FnMut(&Value, &[usize]),
) {
    match node {
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                indices.push(i);
                descend_through_lists(item, rest, indices, visit);
                indices.pop();
            }
        }
        _ => walk(node, rest, indices, visit),
    }
}

/// Build a `{"__typename": T, ...key fields}` representation from an entity
/// object, skipping it (returning `None`) if any key field is absent or
/// null (spec §4.3 edge case: "a key field is missing... the representation
/// is omitted").
fn build_representation(object: &Map<String, Value>, type_name: &str, key_fields: &[String]) -> Option<Value> {
    let mut representation = Map::new();
    representation.insert("__typename".to_string(), Value::String(type_name.to_string()));
    for field in key_fields {
        match object.get(field) {
            Some(value) if !value.is_null() => {
                representation.insert(field.clone(), value.clone());
            }
            _ => return None,
        }
    }
    Some(Value::Object(representation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{OperationKind, StepType, SubgraphRef};
    use crate::supergraph::{Entity, EntityKey, InMemorySupergraphView};
    use serde_json::json;

    fn view() -> InMemorySupergraphView {
        InMemorySupergraphView::new().with_entity(
            SubgraphRef {
                name: "reviews".to_string(),
                endpoint: "http://reviews".to_string(),
            },
            Entity {
                type_name: "Product".to_string(),
                keys: vec![EntityKey::parse("upc")],
            },
        )
    }

    fn entity_step(insertion_path: Vec<&str>) -> Step {
        Step {
            id: StepId(1),
            subgraph: SubgraphRef {
                name: "reviews".to_string(),
                endpoint: "http://reviews".to_string(),
            },
            step_type: StepType::EntityFetch,
            parent_type: Some("Product".to_string()),
            selection_set: vec![],
            depends_on: Default::default(),
            path: vec![],
            insertion_path: insertion_path.into_iter().map(str::to_string).collect(),
            operation_kind: OperationKind::Query,
        }
    }

    #[test]
    fn extracts_single_representation_at_root() {
        let root = json!({"product": {"upc": "1", "name": "Table"}});
        let step = entity_step(vec!["product"]);
        let located = extract_representations(&step, &root, &view()).unwrap();
        assert_eq!(located.len(), 1);
        assert_eq!(located[0].representation["upc"], "1");
        assert_eq!(located[0].representation["__typename"], "Product");
        assert!(located[0].list_indices.is_empty());
    }

    #[test]
    fn fans_out_across_list_with_indices() {
        let root = json!({"products": [
            {"upc": "1"},
            {"upc": "2"},
        ]});
        let step = entity_step(vec!["products"]);
        let located = extract_representations(&step, &root, &view()).unwrap();
        assert_eq!(located.len(), 2);
        assert_eq!(located[0].list_indices, vec![0]);
        assert_eq!(located[1].list_indices, vec![1]);
    }

    #[test]
    fn missing_key_field_is_omitted_not_errored() {
        let root = json!({"products": [
            {"upc": "1"},
            {"name": "no upc here"},
        ]});
        let step = entity_step(vec!["products"]);
        let located = extract_representations(&step, &root, &view()).unwrap();
        assert_eq!(located.len(), 1);
        assert_eq!(located[0].representation["upc"], "1");
    }

    #[test]
    fn empty_extraction_is_a_skip_signal() {
        let root = json!({"product": null});
        let step = entity_step(vec!["product"]);
        let err = extract_representations(&step, &root, &view()).unwrap_err();
        assert!(matches!(err, GatewayError::EmptyRepresentations { step: s } if s == step.id));
    }
}
