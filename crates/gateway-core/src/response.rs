//! # Response & GraphQL error wire types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single path segment in a GraphQL error's `path`: either a field name or
/// a list index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(s: &str) -> Self {
        PathSegment::Field(s.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(s: String) -> Self {
        PathSegment::Field(s)
    }
}

impl From<usize> for PathSegment {
    fn from(i: usize) -> Self {
        PathSegment::Index(i)
    }
}

/// Wire-exact GraphQL error record (spec §3, §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<PathSegment>,
    #[serde(default)]
    pub extensions: serde_json::Map<String, Value>,
}

impl GraphQlError {
    pub fn new(message: impl Into<String>, service_name: &str) -> Self {
        let mut extensions = serde_json::Map::new();
        extensions.insert(
            "serviceName".to_string(),
            Value::String(service_name.to_string()),
        );
        Self {
            message: message.into(),
            path: Vec::new(),
            extensions,
        }
    }

    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = path;
        self
    }

    /// Prepend segments ahead of the error's current path (used to attach a
    /// step's insertion path before a subgraph-native error's own path).
    pub fn prepend_path(mut self, prefix: &[String]) -> Self {
        let mut new_path: Vec<PathSegment> =
            prefix.iter().cloned().map(PathSegment::Field).collect();
        new_path.append(&mut self.path);
        self.path = new_path;
        self
    }
}

/// The top-level response shape returned by [`crate::engine::execute`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub data: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQlError>,
}

impl GatewayResponse {
    /// The single-error, no-data shape used for `InvalidPlan` (spec §4.1:
    /// "no data produced").
    pub fn fatal(error: GraphQlError) -> Self {
        Self {
            data: Value::Null,
            errors: vec![error],
        }
    }
}
