//! # Query Builder (§4.2)
//!
//! Translates a [`Step`] into a GraphQL document string plus the variables
//! map to send alongside it. Grounded in the teacher's
//! `ai::templates::engine` — a small recursive renderer walking a structured
//! tree and emitting text — generalized from Handlebars templates to GraphQL
//! selection-set syntax.

use std::fmt::Write as _;

use serde_json::Value;

use crate::error::{GatewayError, Result};
use crate::plan::{ArgValue, FragmentDefinition, OperationKind, Selection, SelectionSet, Step};
use crate::supergraph::SupergraphView;

/// Where, structurally, a variable was referenced — used to look up its
/// declared argument type. `None` means the reference was nested inside a
/// `ListValue`/`ObjectValue`, where schema-walking the binding is out of
/// scope for this core-facing slice; those fall back to runtime inference.
struct VariableUse {
    name: String,
    binding: Option<(String, String, String)>, // (parent_type, field, argument)
}

/// Recursively collects every `$variable` reference in a selection set,
/// including those nested inside list/object argument values (spec §4.2).
fn collect_variable_uses(
    selection_set: &SelectionSet,
    parent_type: &str,
    fragments: &[FragmentDefinition],
    out: &mut Vec<VariableUse>,
) {
    for selection in selection_set {
        match selection {
            Selection::Field {
                name,
                arguments,
                selection_set,
                ..
            } => {
                for (arg_name, value) in arguments {
                    collect_from_value(value, Some((parent_type, name.as_str(), arg_name.as_str())), out);
                }
                if let Some(sub) = selection_set {
                    // We don't have the field's return type available (no
                    // full schema graph in the core-facing Supergraph View),
                    // so nested argument bindings fall back to runtime
                    // inference rather than a schema lookup.
                    collect_variable_uses(sub, "", fragments, out);
                }
            }
            Selection::InlineFragment {
                type_condition,
                selection_set,
            } => {
                collect_variable_uses(selection_set, type_condition, fragments, out);
            }
            Selection::FragmentSpread { name } => {
                if let Some(def) = fragments.iter().find(|f| &f.name == name) {
                    collect_variable_uses(&def.selection_set, &def.type_condition, fragments, out);
                }
            }
        }
    }
}

fn collect_from_value(
    value: &ArgValue,
    binding: Option<(&str, &str, &str)>,
    out: &mut Vec<VariableUse>,
) {
    match value {
        ArgValue::Variable(name) => out.push(VariableUse {
            name: name.clone(),
            binding: binding.map(|(p, f, a)| (p.to_string(), f.to_string(), a.to_string())),
        }),
        ArgValue::List(items) => {
            for item in items {
                collect_from_value(item, None, out);
            }
        }
        ArgValue::Object(fields) => {
            for (_, v) in fields {
                collect_from_value(v, None, out);
            }
        }
        _ => {}
    }
}

/// Resolve each distinct variable name to a GraphQL type string, per the
/// fallback chain in spec §4.2: (i) schema lookup via the field argument
/// that binds it, (ii) runtime-value inference, (iii) default `String`.
fn resolve_variable_types(
    uses: Vec<VariableUse>,
    subgraph: &str,
    supergraph: &dyn SupergraphView,
    variables: &Value,
) -> Vec<(String, String)> {
    let mut seen = std::collections::HashSet::new();
    let mut resolved = Vec::new();
    for usage in uses {
        if !seen.insert(usage.name.clone()) {
            continue;
        }
        let schema_type = usage.binding.as_ref().and_then(|(parent, field, arg)| {
            supergraph.field_argument_type(subgraph, parent, field, arg)
        });
        let type_name = schema_type.unwrap_or_else(|| {
            variables
                .get(&usage.name)
                .map(ArgValue::infer_type_name)
                .unwrap_or("String")
                .to_string()
        });
        resolved.push((usage.name, type_name));
    }
    resolved
}

fn write_arg_value(buf: &mut String, value: &ArgValue) {
    match value {
        ArgValue::Variable(name) => {
            let _ = write!(buf, "${}", name);
        }
        ArgValue::Int(i) => {
            let _ = write!(buf, "{}", i);
        }
        ArgValue::Float(f) => {
            let _ = write!(buf, "{}", f);
        }
        ArgValue::String(s) => {
            let _ = write!(buf, "{}", serde_json::to_string(s).unwrap_or_else(|_| format!("{:?}", s)));
        }
        ArgValue::Boolean(b) => {
            let _ = write!(buf, "{}", b);
        }
        ArgValue::Null => {
            buf.push_str("null");
        }
        ArgValue::Enum(name) => {
            buf.push_str(name);
        }
        ArgValue::List(items) => {
            buf.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                write_arg_value(buf, item);
            }
            buf.push(']');
        }
        ArgValue::Object(fields) => {
            buf.push('{');
            for (i, (k, v)) in fields.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                let _ = write!(buf, "{}: ", k);
                write_arg_value(buf, v);
            }
            buf.push('}');
        }
    }
}

fn write_selection_set(
    buf: &mut String,
    selection_set: &SelectionSet,
    fragments: &[FragmentDefinition],
) {
    buf.push('{');
    for selection in selection_set {
        write_selection(buf, selection, fragments);
        buf.push(' ');
    }
    buf.push('}');
}

fn write_selection(buf: &mut String, selection: &Selection, fragments: &[FragmentDefinition]) {
    match selection {
        Selection::Field {
            name,
            alias,
            arguments,
            selection_set,
        } => {
            if let Some(alias) = alias {
                let _ = write!(buf, "{}: ", alias);
            }
            buf.push_str(name);
            if !arguments.is_empty() {
                buf.push('(');
                for (i, (arg_name, value)) in arguments.iter().enumerate() {
                    if i > 0 {
                        buf.push_str(", ");
                    }
                    let _ = write!(buf, "{}: ", arg_name);
                    write_arg_value(buf, value);
                }
                buf.push(')');
            }
            if let Some(sub) = selection_set {
                buf.push(' ');
                write_selection_set(buf, sub, fragments);
            }
        }
        Selection::InlineFragment {
            type_condition,
            selection_set,
        } => {
            let _ = write!(buf, "... on {} ", type_condition);
            write_selection_set(buf, selection_set, fragments);
        }
        Selection::FragmentSpread { name } => {
            let _ = write!(buf, "...{}", name);
        }
    }
}

/// Collect every named fragment transitively reachable from a selection set,
/// so the emitted document can declare them.
fn collect_used_fragments<'a>(
    selection_set: &SelectionSet,
    fragments: &'a [FragmentDefinition],
    out: &mut Vec<&'a FragmentDefinition>,
) {
    for selection in selection_set {
        match selection {
            Selection::Field { selection_set, .. } => {
                if let Some(sub) = selection_set {
                    collect_used_fragments(sub, fragments, out);
                }
            }
            Selection::InlineFragment { selection_set, .. } => {
                collect_used_fragments(selection_set, fragments, out);
            }
            Selection::FragmentSpread { name } => {
                if let Some(def) = fragments.iter().find(|f| &f.name == name) {
                    if !out.iter().any(|d| d.name == def.name) {
                        out.push(def);
                        collect_used_fragments(&def.selection_set, fragments, out);
                    }
                }
            }
        }
    }
}

fn write_variable_definitions(buf: &mut String, variable_types: &[(String, String)]) {
    if variable_types.is_empty() {
        return;
    }
    buf.push('(');
    for (i, (name, type_name)) in variable_types.iter().enumerate() {
        if i > 0 {
            buf.push_str(", ");
        }
        let _ = write!(buf, "${}: {}", name, type_name);
    }
    buf.push(')');
}

/// The result of building a subquery: the document text plus the variables
/// map to send with it.
#[derive(Debug)]
pub struct BuiltQuery {
    pub document: String,
    pub variables: Value,
}

/// Build a root `query`/`mutation` document for a `RootOperation` step
/// (spec §4.2, "Root-operation synthesis").
pub fn build_root_query(
    step: &Step,
    incoming_variables: &Value,
    fragments: &[FragmentDefinition],
    supergraph: &dyn SupergraphView,
) -> Result<BuiltQuery> {
    let root_type = match step.operation_kind {
        OperationKind::Query => "Query",
        OperationKind::Mutation => "Mutation",
    };

    let mut uses = Vec::new();
    collect_variable_uses(&step.selection_set, root_type, fragments, &mut uses);
    let variable_types =
        resolve_variable_types(uses, &step.subgraph.name, supergraph, incoming_variables);

    let mut used_fragments = Vec::new();
    collect_used_fragments(&step.selection_set, fragments, &mut used_fragments);

    let mut doc = String::new();
    doc.push_str(step.operation_kind.as_keyword());
    doc.push(' ');
    write_variable_definitions(&mut doc, &variable_types);
    doc.push(' ');
    write_selection_set(&mut doc, &step.selection_set, fragments);
    for fragment in used_fragments {
        doc.push(' ');
        let _ = write!(doc, "fragment {} on {} ", fragment.name, fragment.type_condition);
        write_selection_set(&mut doc, &fragment.selection_set, fragments);
    }

    let mut variables_obj = serde_json::Map::new();
    for (name, _) in &variable_types {
        if let Some(value) = incoming_variables.get(name) {
            variables_obj.insert(name.clone(), value.clone());
        }
    }

    Ok(BuiltQuery {
        document: doc,
        variables: Value::Object(variables_obj),
    })
}

/// Build an `_entities(representations: $representations)` document for an
/// `EntityFetch` step (spec §4.2, "Entity-query synthesis").
///
/// `representations` must be non-empty — callers should treat an empty list
/// as [`GatewayError::EmptyRepresentations`] and skip the step rather than
/// calling this function (spec: "the engine treats this as 'skip step', not
/// a failure").
pub fn build_entity_query(
    step: &Step,
    representations: Vec<Value>,
    incoming_variables: &Value,
) -> Result<BuiltQuery> {
    if representations.is_empty() {
        return Err(GatewayError::EmptyRepresentations { step: step.id });
    }
    let parent_type = step.parent_type.as_deref().ok_or_else(|| GatewayError::QueryBuildError {
        step: step.id,
        message: "entity-fetch step has no parentType".to_string(),
    })?;

    let mut doc = String::new();
    doc.push_str("query ($representations: [_Any!]!");
    // entity fetches may also forward along other outgoing variables the
    // selection set references (e.g. a locale argument on a nested field).
    let mut uses = Vec::new();
    collect_variable_uses(&step.selection_set, parent_type, &[], &mut uses);
    uses.retain(|u| u.name != "representations");
    let mut seen = std::collections::HashSet::new();
    let mut extra_types = Vec::new();
    for usage in uses {
        if seen.insert(usage.name.clone()) {
            let type_name = incoming_variables
                .get(&usage.name)
                .map(ArgValue::infer_type_name)
                .unwrap_or("String")
                .to_string();
            extra_types.push((usage.name, type_name));
        }
    }
    for (name, type_name) in &extra_types {
        let _ = write!(doc, ", ${}: {}", name, type_name);
    }
    doc.push_str(") { _entities(representations: $representations) { ... on ");
    doc.push_str(parent_type);
    doc.push(' ');
    write_selection_set(&mut doc, &step.selection_set, &[]);
    doc.push_str(" } }");

    let mut variables_obj = serde_json::Map::new();
    variables_obj.insert("representations".to_string(), Value::Array(representations));
    for (name, _) in &extra_types {
        if let Some(value) = incoming_variables.get(name) {
            variables_obj.insert(name.clone(), value.clone());
        }
    }

    Ok(BuiltQuery {
        document: doc,
        variables: Value::Object(variables_obj),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{StepId, StepType, SubgraphRef};
    use crate::supergraph::InMemorySupergraphView;

    fn base_step() -> Step {
        Step {
            id: StepId(0),
            subgraph: SubgraphRef {
                name: "products".to_string(),
                endpoint: "http://products".to_string(),
            },
            step_type: StepType::RootOperation,
            parent_type: None,
            selection_set: vec![],
            depends_on: Default::default(),
            path: vec![],
            insertion_path: vec![],
            operation_kind: OperationKind::Query,
        }
    }

    #[test]
    fn builds_root_query_with_inferred_variable_type() {
        let mut step = base_step();
        step.selection_set = vec![Selection::Field {
            name: "product".to_string(),
            alias: None,
            arguments: vec![("id".to_string(), ArgValue::Variable("id".to_string()))],
            selection_set: Some(vec![Selection::Field {
                name: "name".to_string(),
                alias: None,
                arguments: vec![],
                selection_set: None,
            }]),
        }];
        let variables = serde_json::json!({"id": "p1"});
        let view = InMemorySupergraphView::new();
        let built = build_root_query(&step, &variables, &[], &view).unwrap();
        assert!(built.document.starts_with("query ($id: String)"));
        assert!(built.document.contains("product(id: $id)"));
        assert_eq!(built.variables["id"], "p1");
    }

    #[test]
    fn builds_entity_query_with_inline_fragment() {
        let mut step = base_step();
        step.step_type = StepType::EntityFetch;
        step.parent_type = Some("Product".to_string());
        step.selection_set = vec![
            Selection::Field {
                name: "weight".to_string(),
                alias: None,
                arguments: vec![],
                selection_set: None,
            },
            Selection::Field {
                name: "height".to_string(),
                alias: None,
                arguments: vec![],
                selection_set: None,
            },
        ];
        let reps = vec![serde_json::json!({"__typename": "Product", "upc": "1"})];
        let built = build_entity_query(&step, reps, &Value::Null).unwrap();
        assert!(built.document.contains("_entities(representations: $representations)"));
        assert!(built.document.contains("... on Product"));
        assert_eq!(built.variables["representations"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn empty_representations_is_a_skip_signal() {
        let mut step = base_step();
        step.step_type = StepType::EntityFetch;
        step.parent_type = Some("Product".to_string());
        let err = build_entity_query(&step, vec![], &Value::Null).unwrap_err();
        assert!(matches!(err, GatewayError::EmptyRepresentations { .. }));
    }
}
