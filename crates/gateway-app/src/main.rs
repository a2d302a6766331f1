//! Demonstration binary: loads a `Plan` and its variables from disk, runs
//! them through `gateway-core`, and prints the resulting GraphQL response.
//!
//! Grounded in the teacher's `nodes::agent::BaseAgentNode`: a thin
//! `reqwest::Client`-backed implementation of the core's injected client
//! trait, kept out of the library crate so the core stays transport-free.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use gateway_core::prelude::*;
use gateway_core::subgraph_client::ClientError;
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(name = "gateway", about = "Run a federated execution plan against live subgraphs")]
struct Cli {
    /// Path to a JSON-encoded `gateway_core::plan::Plan`.
    #[arg(long)]
    plan: String,

    /// Path to a JSON object of operation variables. Defaults to `{}`.
    #[arg(long)]
    variables: Option<String>,
}

struct ReqwestSubgraphClient {
    client: Arc<reqwest::Client>,
}

impl ReqwestSubgraphClient {
    fn new() -> Self {
        Self {
            client: Arc::new(reqwest::Client::new()),
        }
    }
}

#[async_trait]
impl SubgraphClient for ReqwestSubgraphClient {
    async fn send(
        &self,
        endpoint: &str,
        body: SubgraphRequestBody,
        ctx: &RequestContext,
    ) -> std::result::Result<Value, ClientError> {
        let mut request = self.client.post(endpoint).json(&body);
        if let Some(timeout) = ctx.timeout {
            request = request.timeout(timeout);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::new(format!("request to {} failed: {}", endpoint, e)))?;
        response
            .json::<Value>()
            .await
            .map_err(|e| ClientError::new(format!("invalid JSON from {}: {}", endpoint, e)))
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    let plan_raw = fs::read_to_string(&cli.plan)?;
    let plan: Plan = serde_json::from_str(&plan_raw)?;

    let variables: Value = match &cli.variables {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => Value::Object(Default::default()),
    };

    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            tracing::warn!(%error, "invalid environment configuration, using defaults");
            GatewayConfig::default()
        }
    };

    let client: Arc<dyn SubgraphClient> = Arc::new(ReqwestSubgraphClient::new());
    let supergraph: Arc<dyn SupergraphView> = Arc::new(InMemorySupergraphView::new());

    let response = tokio::time::timeout(
        Duration::from_secs(60),
        execute(&plan, variables, client, supergraph, &config),
    )
    .await
    .map_err(|_| "execution exceeded the overall 60s deadline")?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
