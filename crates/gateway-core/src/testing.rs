//! # Test doubles
//!
//! Grounded in the teacher's `testing::mocks::MockAgentRegistryImpl`: a
//! `std::sync::Mutex`-guarded collection pre-seeded by the test, exposed
//! through the same async trait real callers use.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::subgraph_client::{ClientError, RequestContext, SubgraphClient, SubgraphRequestBody};

/// A [`SubgraphClient`] that returns a pre-registered response for each
/// endpoint, or a pre-registered error. Registrations are consumed in FIFO
/// order per endpoint, so a test can script a sequence of responses for
/// retries or repeated calls to the same subgraph.
#[derive(Default)]
pub struct MockSubgraphClient {
    responses: Mutex<HashMap<String, Vec<Result<Value, String>>>>,
    requests: Mutex<Vec<(String, SubgraphRequestBody)>>,
}

impl MockSubgraphClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response body for the given endpoint.
    pub fn with_response(self, endpoint: impl Into<String>, response: Value) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(endpoint.into())
            .or_default()
            .push(Ok(response));
        self
    }

    /// Queue a transport failure for the given endpoint.
    pub fn with_error(self, endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(endpoint.into())
            .or_default()
            .push(Err(message.into()));
        self
    }

    /// The requests observed so far, in call order, for assertions on the
    /// queries the engine actually built.
    pub fn requests(&self) -> Vec<(String, SubgraphRequestBody)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubgraphClient for MockSubgraphClient {
    async fn send(
        &self,
        endpoint: &str,
        body: SubgraphRequestBody,
        _ctx: &RequestContext,
    ) -> Result<Value, ClientError> {
        self.requests
            .lock()
            .unwrap()
            .push((endpoint.to_string(), body));

        let mut responses = self.responses.lock().unwrap();
        let queue = responses
            .get_mut(endpoint)
            .filter(|queue| !queue.is_empty())
            .ok_or_else(|| ClientError::new(format!("no mock response registered for {}", endpoint)))?;
        match queue.remove(0) {
            Ok(value) => Ok(value),
            Err(message) => Err(ClientError::new(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn replays_queued_responses_in_order() {
        let client = MockSubgraphClient::new()
            .with_response("http://products", serde_json::json!({"data": {"a": 1}}))
            .with_response("http://products", serde_json::json!({"data": {"a": 2}}));
        let ctx = RequestContext::new(Uuid::new_v4());
        let body = SubgraphRequestBody {
            query: "{ a }".to_string(),
            variables: Value::Null,
        };
        let first = client.send("http://products", body.clone(), &ctx).await.unwrap();
        let second = client.send("http://products", body, &ctx).await.unwrap();
        assert_eq!(first["data"]["a"], 1);
        assert_eq!(second["data"]["a"], 2);
        assert_eq!(client.requests().len(), 2);
    }

    #[tokio::test]
    async fn missing_registration_is_a_client_error() {
        let client = MockSubgraphClient::new();
        let ctx = RequestContext::new(Uuid::new_v4());
        let body = SubgraphRequestBody {
            query: "{ a }".to_string(),
            variables: Value::Null,
        };
        let err = client.send("http://unregistered", body, &ctx).await.unwrap_err();
        assert!(err.to_string().contains("no mock response"));
    }
}
