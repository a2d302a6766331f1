//! # Plan & Step data model
//!
//! The types here are the core's *input*: a [`Plan`] is produced by an
//! external planner (out of scope for this crate, per spec) and handed to
//! [`crate::engine::execute`] as an immutable value. Steps are stored in a
//! flat arena (`Plan::steps`) and referenced by index (`StepId`) rather than
//! by pointer, following the teacher's `TypeId`-keyed node graph
//! (`workflow::schema::WorkflowSchema`) generalized from a fixed node-type
//! registry to an arbitrary per-run DAG of fetches.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Index of a [`Step`] within a [`Plan::steps`] arena.
///
/// Steps reference each other (`dependsOn`) by this id rather than by
/// pointer, which keeps the plan `Send + Sync` and trivially cloneable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StepId(pub usize);

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// GraphQL operation type a root step executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
}

impl OperationKind {
    pub fn as_keyword(&self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
        }
    }
}

/// Whether a step is a top-level root operation or a dependent
/// `_entities(...)` fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepType {
    RootOperation,
    EntityFetch,
}

/// Reference to the subgraph a step targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubgraphRef {
    pub name: String,
    pub endpoint: String,
}

/// A literal or variable-referencing GraphQL argument value.
///
/// Mirrors the subset of the GraphQL value grammar the Query Builder needs
/// to re-emit: literals are written inline, `Variable` becomes `$name`.
///
/// Adjacently tagged (`kind` + `value`) rather than internally tagged:
/// several variants wrap a bare scalar or list rather than a map, which
/// internal tagging cannot represent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum ArgValue {
    Variable(String),
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
    Enum(String),
    List(Vec<ArgValue>),
    Object(Vec<(String, ArgValue)>),
}

impl ArgValue {
    /// Infer a runtime value's GraphQL scalar type name, per spec §4.2's
    /// fallback chain: string -> `String`, integer -> `Int`,
    /// floating -> `Float`, boolean -> `Boolean`, else default `String`.
    pub fn infer_type_name(value: &Value) -> &'static str {
        match value {
            Value::String(_) => "String",
            Value::Number(n) if n.is_i64() || n.is_u64() => "Int",
            Value::Number(_) => "Float",
            Value::Bool(_) => "Boolean",
            _ => "String",
        }
    }
}

/// One requested field, inline fragment, or named fragment spread within a
/// selection set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Selection {
    Field {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        alias: Option<String>,
        #[serde(default)]
        arguments: Vec<(String, ArgValue)>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        selection_set: Option<SelectionSet>,
    },
    InlineFragment {
        type_condition: String,
        selection_set: SelectionSet,
    },
    FragmentSpread {
        name: String,
    },
}

impl Selection {
    /// The response key this selection occupies: the alias if present,
    /// otherwise the field name. Inline fragments and fragment spreads have
    /// no response key of their own.
    pub fn response_key(&self) -> Option<&str> {
        match self {
            Selection::Field { alias, name, .. } => Some(alias.as_deref().unwrap_or(name)),
            Selection::InlineFragment { .. } | Selection::FragmentSpread { .. } => None,
        }
    }
}

/// An ordered list of selections, the unit the Query Builder and Response
/// Stitcher both walk.
pub type SelectionSet = Vec<Selection>;

/// A named fragment definition, referenced by [`Selection::FragmentSpread`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentDefinition {
    pub name: String,
    pub type_condition: String,
    pub selection_set: SelectionSet,
}

/// The client operation's original (post-parse) selection set, retained only
/// for the pruning phase (spec §3: "used only by the pruning phase").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginalDocument {
    pub selection_set: SelectionSet,
}

/// A single fetch to one subgraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub subgraph: SubgraphRef,
    pub step_type: StepType,
    /// The GraphQL type name whose fields are selected. Only meaningful for
    /// `EntityFetch` steps; `None` for root operations.
    #[serde(default)]
    pub parent_type: Option<String>,
    pub selection_set: SelectionSet,
    #[serde(default)]
    pub depends_on: HashSet<StepId>,
    /// Field-name chain from the operation root to this step's target.
    /// Used to build error paths for root-operation steps.
    #[serde(default)]
    pub path: Vec<String>,
    /// Field-name chain from the root data into which this step's
    /// contribution must be merged. Used to build error paths for
    /// entity-fetch steps and to drive stitching/representation extraction.
    #[serde(default)]
    pub insertion_path: Vec<String>,
    #[serde(default = "default_operation_kind")]
    pub operation_kind: OperationKind,
}

fn default_operation_kind() -> OperationKind {
    OperationKind::Query
}

impl Step {
    pub fn is_root(&self) -> bool {
        matches!(self.step_type, StepType::RootOperation)
    }

    /// The error-path segments for this step, per spec §9's design note:
    /// root steps use `path`, entity-fetch steps use `insertion_path`.
    pub fn error_path(&self) -> &[String] {
        if self.is_root() {
            &self.path
        } else {
            &self.insertion_path
        }
    }
}

/// An immutable input to execution: a DAG of [`Step`]s plus the information
/// needed for response pruning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<Step>,
    pub root_step_indexes: Vec<StepId>,
    pub original_document: OriginalDocument,
    #[serde(default)]
    pub fragment_definitions: Vec<FragmentDefinition>,
}

impl Plan {
    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn fragment(&self, name: &str) -> Option<&FragmentDefinition> {
        self.fragment_definitions.iter().find(|f| f.name == name)
    }
}
