//! # Error Taxonomy
//!
//! All failure modes the execution core can encounter are variants of
//! [`GatewayError`]. Most variants are *recorded*, never thrown: the engine
//! converts them into a [`crate::response::GraphQlError`] and keeps
//! executing (see [`crate::engine`]). The sole exception is
//! [`GatewayError::InvalidPlan`], which aborts the run before any request is
//! sent.
//!
//! This mirrors the teacher crate's `WorkflowError` — a single
//! `thiserror`-derived enum covering structural and processing failures —
//! trimmed to the kinds this core actually produces.

use thiserror::Error;

use crate::plan::StepId;

/// Primary error type for the execution core.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// `dependsOn` contains a cycle; no step was executed.
    #[error("plan contains a cycle in its step dependencies")]
    InvalidPlan,

    /// The Query Builder could not synthesize a valid document for a step.
    #[error("failed to build query for step {step}: {message}")]
    QueryBuildError { step: StepId, message: String },

    /// The injected Subgraph Client failed to complete the request.
    #[error("transport failure for step {step}: {message}")]
    TransportError { step: StepId, message: String },

    /// Stitching found a shape mismatch merging a subgraph response.
    #[error("merge type mismatch at step {step}: expected {expected}, found {found}")]
    MergeTypeMismatch {
        step: StepId,
        expected: &'static str,
        found: &'static str,
    },

    /// Stitching found a list-length mismatch between representations sent
    /// and entities returned.
    #[error(
        "length mismatch at step {step}: sent {sent} representation(s), received {received} entit(y/ies)"
    )]
    LengthMismatch {
        step: StepId,
        sent: usize,
        received: usize,
    },

    /// The Representation Extractor produced zero representations for an
    /// entity-fetch step. Non-fatal: the engine skips the step.
    #[error("no representations extracted for step {step}")]
    EmptyRepresentations { step: StepId },
}

impl GatewayError {
    /// The step this error is attributed to, if any. `InvalidPlan` has no
    /// single step to blame.
    pub fn step(&self) -> Option<StepId> {
        match self {
            GatewayError::InvalidPlan => None,
            GatewayError::QueryBuildError { step, .. }
            | GatewayError::TransportError { step, .. }
            | GatewayError::MergeTypeMismatch { step, .. }
            | GatewayError::LengthMismatch { step, .. }
            | GatewayError::EmptyRepresentations { step } => Some(*step),
        }
    }
}

/// Result type used throughout the core.
pub type Result<T> = std::result::Result<T, GatewayError>;
