//! # Subgraph Client contract (§4.5)
//!
//! The core depends on a minimal injected capability rather than owning a
//! transport stack itself (spec §1: "Transport... is external"). This
//! mirrors the teacher's `nodes::agent::BaseAgentNode`, which holds an
//! `Arc<reqwest::Client>` behind a narrow async method rather than exposing
//! `reqwest` types through the engine.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Notify;

/// The HTTP-shaped request body sent to a subgraph (spec §6).
#[derive(Debug, Clone, Serialize)]
pub struct SubgraphRequestBody {
    pub query: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub variables: Value,
}

/// A cooperative cancellation signal. Cloning shares the same underlying
/// flag; calling `cancel` wakes every outstanding `cancelled().await`.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<Notify>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(Notify::new()))
    }

    pub fn cancel(&self) {
        self.0.notify_waiters();
    }

    pub async fn cancelled(&self) {
        self.0.notified().await;
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CancellationToken")
    }
}

/// Per-request context threaded through the injected client: cancellation
/// and a timeout hint (spec §5: "Timeouts are the client's responsibility;
/// the engine observes them as transport errors").
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub cancellation: CancellationToken,
    pub timeout: Option<Duration>,
    pub request_id: uuid::Uuid,
}

impl RequestContext {
    pub fn new(request_id: uuid::Uuid) -> Self {
        Self {
            cancellation: CancellationToken::new(),
            timeout: None,
            request_id,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A transport-layer failure surfaced by the injected client. The engine
/// wraps this into [`crate::error::GatewayError::TransportError`].
#[derive(Debug)]
pub struct ClientError(pub String);

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ClientError {}

impl ClientError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The minimal transport capability the engine requires: POST a GraphQL
/// request, get back a parsed JSON object (spec §4.5, §6).
#[async_trait]
pub trait SubgraphClient: Send + Sync {
    async fn send(
        &self,
        endpoint: &str,
        body: SubgraphRequestBody,
        ctx: &RequestContext,
    ) -> Result<Value, ClientError>;
}
