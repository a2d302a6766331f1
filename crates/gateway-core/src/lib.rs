//! # Gateway Core
//!
//! Plan-driven execution core for a federated GraphQL gateway. Given a
//! [`plan::Plan`] produced by an external query planner, this crate
//! schedules its steps into dependency waves, synthesizes each subquery,
//! dispatches it through an injected [`subgraph_client::SubgraphClient`],
//! and stitches the responses into a single GraphQL-shaped result.
//!
//! ## Core concepts
//!
//! - **[`plan::Plan`] / [`plan::Step`]**: the immutable DAG of fetches to
//!   run, produced upstream of this crate.
//! - **[`engine::execute`]**: the single entrypoint — validates the plan,
//!   runs its waves, and returns a [`response::GatewayResponse`].
//! - **[`supergraph::SupergraphView`]**: the narrow read interface the core
//!   needs from a composed supergraph (entity ownership, `@key` sets).
//! - **[`subgraph_client::SubgraphClient`]**: the injected transport
//!   capability; this crate never opens a socket itself.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gateway_core::prelude::*;
//!
//! # async fn run(plan: Plan) {
//! let client: Arc<dyn SubgraphClient> = Arc::new(MockSubgraphClient::new());
//! let supergraph: Arc<dyn SupergraphView> = Arc::new(InMemorySupergraphView::new());
//! let config = GatewayConfig::default();
//! let response = execute(&plan, serde_json::json!({}), client, supergraph, &config).await;
//! # let _ = response;
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod plan;
pub mod query_builder;
pub mod representation;
pub mod response;
pub mod stitcher;
pub mod subgraph_client;
pub mod supergraph;

pub mod testing;

pub use config::GatewayConfig;
pub use engine::execute;
pub use error::{GatewayError, Result};
pub use plan::{Plan, Step, StepId};
pub use response::{GatewayResponse, GraphQlError};
pub use subgraph_client::SubgraphClient;
pub use supergraph::{InMemorySupergraphView, SupergraphView};

/// Current version of the gateway core.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports for callers embedding the engine.
pub mod prelude {
    pub use crate::config::GatewayConfig;
    pub use crate::engine::execute;
    pub use crate::error::{GatewayError, Result};
    pub use crate::plan::{
        ArgValue, FragmentDefinition, OperationKind, OriginalDocument, Plan, Selection,
        SelectionSet, Step, StepId, StepType, SubgraphRef,
    };
    pub use crate::response::{GatewayResponse, GraphQlError};
    pub use crate::subgraph_client::{RequestContext, SubgraphClient, SubgraphRequestBody};
    pub use crate::supergraph::{Entity, EntityKey, InMemorySupergraphView, SupergraphView};
    pub use crate::testing::MockSubgraphClient;

    pub use async_trait::async_trait;
    pub use serde_json::{json, Value};
    pub use uuid::Uuid;
}
