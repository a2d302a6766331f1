//! # ExecutionContext — shared per-run mutable state
//!
//! Grounded in the teacher's `task::TaskContext`: a single struct that flows
//! through execution, carrying accumulated state rather than being rebuilt
//! at each step. The teacher's context is owned by one node at a time; ours
//! is shared across concurrently-running steps within a wave, so it is
//! wrapped in a single coarse mutex per spec §5 and §9's design note
//! ("favor a single coarse mutex over the context map + error list... finer
//! grained locking would add complexity without measurable benefit").

use std::collections::HashSet;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::plan::StepId;
use crate::response::GraphQlError;

struct Inner {
    /// The single assembled root data tree. Every root step unions its own
    /// top-level fields into this map; every entity-fetch step stitches its
    /// `_entities` result into it at its insertion path.
    root_data: Value,
    /// Steps that have finished (successfully, skipped, or failed) —
    /// readiness for the next wave only requires completion, not success.
    completed: HashSet<StepId>,
    errors: Vec<GraphQlError>,
}

/// Per-run mutable state, created at the start of [`crate::engine::execute`]
/// and dropped when it returns.
pub struct ExecutionContext {
    inner: Mutex<Inner>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                root_data: Value::Object(serde_json::Map::new()),
                completed: HashSet::new(),
                errors: Vec::new(),
            }),
        }
    }

    /// A snapshot of the current root data tree. Used by the Representation
    /// Extractor, which always reads from root data rather than an
    /// individual step's own raw result (spec §4.3: "because earlier merges
    /// place new fields there").
    pub async fn root_data(&self) -> Value {
        self.inner.lock().await.root_data.clone()
    }

    /// Union a root step's own top-level fields into the shared root data
    /// object (spec §4.1 step 4: "Merge the data of each root step into a
    /// single `data` object (top-level field union)").
    pub async fn union_root_fields(&self, fields: serde_json::Map<String, Value>) {
        let mut inner = self.inner.lock().await;
        let root_obj = inner
            .root_data
            .as_object_mut()
            .expect("root data is always an object");
        for (k, v) in fields {
            root_obj.insert(k, v);
        }
    }

    /// Mutate the shared root data tree in place, used by the Response
    /// Stitcher to apply an `_entities` merge or a null-propagation pass.
    pub async fn with_root_data_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Value) -> R,
    {
        let mut inner = self.inner.lock().await;
        f(&mut inner.root_data)
    }

    pub async fn mark_completed(&self, step: StepId) {
        self.inner.lock().await.completed.insert(step);
    }

    pub async fn is_completed(&self, step: StepId) -> bool {
        self.inner.lock().await.completed.contains(&step)
    }

    pub async fn record_error(&self, error: GraphQlError) {
        self.inner.lock().await.errors.push(error);
    }

    pub async fn record_errors(&self, errors: impl IntoIterator<Item = GraphQlError>) {
        self.inner.lock().await.errors.extend(errors);
    }

    pub async fn errors(&self) -> Vec<GraphQlError> {
        self.inner.lock().await.errors.clone()
    }

    pub async fn into_parts(self) -> (Value, Vec<GraphQlError>) {
        let inner = self.inner.into_inner();
        (inner.root_data, inner.errors)
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}
