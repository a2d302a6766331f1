//! # Response Stitcher (§4.4, §4.1 step 6)
//!
//! Merges an `_entities` result back into the shared root data tree at the
//! locations the Representation Extractor recorded, nulls out a step's
//! contribution on failure, and prunes the assembled tree down to exactly
//! what the client's original selection set asked for.
//!
//! Grounded in the teacher's `task::TaskContext::update_node` /
//! `set_data` path-targeted mutation, generalized from a flat key write to
//! a path-plus-list-index walk mirroring [`crate::representation`]'s read
//! side.

use std::collections::VecDeque;

use serde_json::{Map, Value};

use crate::error::{GatewayError, Result};
use crate::plan::{FragmentDefinition, OriginalDocument, Selection, SelectionSet, Step, StepId};
use crate::representation::LocatedEntity;

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn navigate_mut<'a>(
    node: &'a mut Value,
    path: &[String],
    indices: &mut VecDeque<usize>,
) -> Option<&'a mut Value> {
    match path.split_first() {
        None => Some(node),
        Some((head, rest)) => match node {
            Value::Object(map) => {
                let next = map.get_mut(head)?;
                descend_mut(next, rest, indices)
            }
            Value::Array(items) => {
                let idx = indices.pop_front()?;
                let item = items.get_mut(idx)?;
                navigate_mut(item, path, indices)
            }
            _ => None,
        },
    }
}

fn descend_mut<'a>(
    node: &'a mut Value,
    rest: &[String],
    indices: &mut VecDeque<usize>,
) -> Option<&'a mut Value> {
    match node {
        Value::Array(items) => {
            let idx = indices.pop_front()?;
            let item = items.get_mut(idx)?;
            descend_mut(item, rest, indices)
        }
        _ => navigate_mut(node, rest, indices),
    }
}

/// Merge one `_entities` result into its target object. A `null` entity
/// (the subgraph could not resolve that representation) leaves the target
/// untouched rather than nulling it out — the fields already merged from
/// earlier steps must survive (spec §8: "must leave the corresponding
/// target object unchanged").
fn merge_entity(target: &mut Value, entity: Value, step: StepId) -> Result<()> {
    match entity {
        Value::Null => Ok(()),
        Value::Object(fields) => {
            let found = json_type_name(target);
            let target_obj = target
                .as_object_mut()
                .ok_or_else(|| GatewayError::MergeTypeMismatch {
                    step,
                    expected: "object",
                    found,
                })?;
            for (k, v) in fields {
                target_obj.insert(k, v);
            }
            Ok(())
        }
        other => Err(GatewayError::MergeTypeMismatch {
            step,
            expected: "object",
            found: json_type_name(&other),
        }),
    }
}

/// Merge an `_entities` response array back into `root_data` at the
/// locations `located` recorded, in order (spec §4.4: "the `i`th entity in
/// the response corresponds to the `i`th representation sent").
pub fn stitch_entities(
    step: &Step,
    root_data: &mut Value,
    located: &[LocatedEntity],
    entities: Vec<Value>,
) -> Result<()> {
    if entities.len() != located.len() {
        return Err(GatewayError::LengthMismatch {
            step: step.id,
            sent: located.len(),
            received: entities.len(),
        });
    }
    for (location, entity) in located.iter().zip(entities.into_iter()) {
        let mut indices: VecDeque<usize> = location.list_indices.iter().copied().collect();
        let target = navigate_mut(root_data, &step.insertion_path, &mut indices).ok_or(
            GatewayError::MergeTypeMismatch {
                step: step.id,
                expected: "object",
                found: "missing",
            },
        )?;
        merge_entity(target, entity, step.id)?;
    }
    Ok(())
}

/// Null out every location an entity-fetch step would have contributed to,
/// used when the step fails after extraction but before (or during)
/// stitching (spec §7: a recorded failure nulls the step's own output).
///
/// Only the fields the step's own selection set would have contributed are
/// nulled — key fields and any data merged by earlier steps at the same
/// location survive (spec §8: "every non-key, non-`__typename` field in
/// S's selection set is set to null at S's insertion point").
pub fn null_entity_locations(root_data: &mut Value, step: &Step, located: &[LocatedEntity]) {
    for location in located {
        let mut indices: VecDeque<usize> = location.list_indices.iter().copied().collect();
        if let Some(target) = navigate_mut(root_data, &step.insertion_path, &mut indices) {
            if let Some(object) = target.as_object_mut() {
                for selection in &step.selection_set {
                    if let Some(key) = selection.response_key() {
                        object.insert(key.to_string(), Value::Null);
                    }
                }
            }
        }
    }
}

/// Null out the top-level fields a failed root-operation step would have
/// contributed, identified by the response keys of its own selection set
/// (spec §7).
pub fn null_root_step_fields(root_data: &mut Value, step: &Step) {
    if let Some(object) = root_data.as_object_mut() {
        for selection in &step.selection_set {
            if let Some(key) = selection.response_key() {
                object.insert(key.to_string(), Value::Null);
            }
        }
    }
}

fn collect_allowed<'a>(
    selection_set: &'a SelectionSet,
    fragments: &'a [FragmentDefinition],
    out: &mut Vec<(String, Option<&'a SelectionSet>)>,
) {
    for selection in selection_set {
        match selection {
            Selection::Field {
                name,
                alias,
                selection_set,
                ..
            } => {
                let key = alias.clone().unwrap_or_else(|| name.clone());
                out.push((key, selection_set.as_ref()));
            }
            Selection::InlineFragment { selection_set, .. } => {
                collect_allowed(selection_set, fragments, out);
            }
            Selection::FragmentSpread { name } => {
                if let Some(def) = fragments.iter().find(|f| &f.name == name) {
                    collect_allowed(&def.selection_set, fragments, out);
                }
            }
        }
    }
}

fn prune_value(value: &Value, selection_set: &SelectionSet, fragments: &[FragmentDefinition]) -> Value {
    match value {
        Value::Object(map) => {
            let mut allowed = Vec::new();
            collect_allowed(selection_set, fragments, &mut allowed);
            let mut pruned = Map::new();
            for (key, sub) in &allowed {
                if let Some(v) = map.get(key) {
                    let pruned_value = match sub {
                        Some(sub_set) => prune_value(v, sub_set, fragments),
                        None => v.clone(),
                    };
                    pruned.insert(key.clone(), pruned_value);
                }
            }
            Value::Object(pruned)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| prune_value(item, selection_set, fragments))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Drop any field not present in the client's original selection set — the
/// fields the planner added purely to satisfy `@key` requirements never
/// reach the client (spec §4.1 step 6, §3).
pub fn prune_response(
    data: &Value,
    original_document: &OriginalDocument,
    fragments: &[FragmentDefinition],
) -> Value {
    prune_value(data, &original_document.selection_set, fragments)
}
