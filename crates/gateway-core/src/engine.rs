//! # Execution Engine (§4.1, §5)
//!
//! Ties the data model, Query Builder, Representation Extractor, and
//! Response Stitcher together into the single public entrypoint,
//! [`execute`]. Wave scheduling and step dispatch are grounded in the
//! teacher's `workflow::validator::WorkflowValidator` (DAG cycle detection)
//! and its node-by-node dispatcher, generalized from a single-threaded
//! walk to `tokio::task::JoinSet`-driven concurrent waves (spec §5: "steps
//! within a wave run concurrently").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::context::ExecutionContext;
use crate::error::{GatewayError, Result};
use crate::plan::{FragmentDefinition, Plan, Step, StepId};
use crate::query_builder;
use crate::representation::{self, LocatedEntity};
use crate::response::{GatewayResponse, GraphQlError, PathSegment};
use crate::stitcher;
use crate::subgraph_client::{RequestContext, SubgraphClient, SubgraphRequestBody};
use crate::supergraph::SupergraphView;

/// Group a plan's steps into dependency waves via Kahn's algorithm. Returns
/// [`GatewayError::InvalidPlan`] if any step is unreachable once all
/// resolvable dependencies are peeled off — the signature of a cycle (spec
/// §4.1: "reject plans whose `dependsOn` edges form a cycle").
fn compute_waves(plan: &Plan) -> Result<Vec<Vec<StepId>>> {
    let mut remaining: HashMap<StepId, usize> = plan
        .steps
        .iter()
        .map(|step| (step.id, step.depends_on.len()))
        .collect();
    let mut dependents: HashMap<StepId, Vec<StepId>> = HashMap::new();
    for step in &plan.steps {
        for dependency in &step.depends_on {
            dependents.entry(*dependency).or_default().push(step.id);
        }
    }

    let mut waves = Vec::new();
    let mut scheduled = 0usize;
    let mut current: Vec<StepId> = remaining
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| *id)
        .collect();
    current.sort();

    while !current.is_empty() {
        scheduled += current.len();
        let mut next = Vec::new();
        for id in &current {
            if let Some(deps) = dependents.get(id) {
                for dependent in deps {
                    let count = remaining.get_mut(dependent).expect("known step");
                    *count -= 1;
                    if *count == 0 {
                        next.push(*dependent);
                    }
                }
            }
        }
        waves.push(current);
        next.sort();
        current = next;
    }

    if scheduled != plan.steps.len() {
        return Err(GatewayError::InvalidPlan);
    }
    Ok(waves)
}

/// Parse a subgraph response's top-level `errors` array into
/// [`GraphQlError`]s tagged with the subgraph's name (spec §4.1 step 5,
/// §6).
fn extract_subgraph_errors(response: &Value, subgraph_name: &str) -> Vec<GraphQlError> {
    let Some(errors) = response.get("errors").and_then(Value::as_array) else {
        return Vec::new();
    };
    errors
        .iter()
        .map(|item| {
            let message = item
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("subgraph returned an error")
                .to_string();
            let mut error = GraphQlError::new(message, subgraph_name);
            if let Some(path) = item.get("path").and_then(Value::as_array) {
                error.path = path
                    .iter()
                    .filter_map(|segment| {
                        if let Some(s) = segment.as_str() {
                            Some(PathSegment::Field(s.to_string()))
                        } else {
                            segment.as_u64().map(|i| PathSegment::Index(i as usize))
                        }
                    })
                    .collect();
            }
            error
        })
        .collect()
}

struct StepDeps {
    client: Arc<dyn SubgraphClient>,
    supergraph: Arc<dyn SupergraphView>,
    context: Arc<ExecutionContext>,
    variables: Arc<Value>,
    fragments: Arc<Vec<FragmentDefinition>>,
    timeout: Duration,
    request_id: Uuid,
}

async fn run_root_step(step: &Step, deps: &StepDeps) -> Result<()> {
    let built = query_builder::build_root_query(
        step,
        &deps.variables,
        &deps.fragments,
        deps.supergraph.as_ref(),
    )?;
    let request_ctx = RequestContext::new(deps.request_id).with_timeout(deps.timeout);
    let body = SubgraphRequestBody {
        query: built.document,
        variables: built.variables,
    };

    let response = match deps.client.send(&step.subgraph.endpoint, body, &request_ctx).await {
        Ok(response) => response,
        Err(error) => {
            deps.context
                .with_root_data_mut(|root| stitcher::null_root_step_fields(root, step))
                .await;
            return Err(GatewayError::TransportError {
                step: step.id,
                message: error.to_string(),
            });
        }
    };

    let subgraph_errors = extract_subgraph_errors(&response, &step.subgraph.name);
    if !subgraph_errors.is_empty() {
        deps.context
            .record_errors(subgraph_errors.into_iter().map(|e| e.prepend_path(&step.path)))
            .await;
    }

    match response.get("data").and_then(Value::as_object) {
        Some(data) => deps.context.union_root_fields(data.clone()).await,
        None => {
            deps.context
                .with_root_data_mut(|root| stitcher::null_root_step_fields(root, step))
                .await
        }
    }

    Ok(())
}

async fn run_entity_step(step: &Step, deps: &StepDeps) -> Result<()> {
    let root_snapshot = deps.context.root_data().await;
    let located: Vec<LocatedEntity> =
        match representation::extract_representations(step, &root_snapshot, deps.supergraph.as_ref()) {
            Ok(located) => located,
            Err(GatewayError::EmptyRepresentations { .. }) => return Ok(()),
            Err(other) => return Err(other),
        };

    let representations: Vec<Value> = located.iter().map(|l| l.representation.clone()).collect();
    let built = query_builder::build_entity_query(step, representations, &deps.variables)?;
    let request_ctx = RequestContext::new(deps.request_id).with_timeout(deps.timeout);
    let body = SubgraphRequestBody {
        query: built.document,
        variables: built.variables,
    };

    let response = match deps.client.send(&step.subgraph.endpoint, body, &request_ctx).await {
        Ok(response) => response,
        Err(error) => {
            deps.context
                .with_root_data_mut(|root| stitcher::null_entity_locations(root, step, &located))
                .await;
            return Err(GatewayError::TransportError {
                step: step.id,
                message: error.to_string(),
            });
        }
    };

    let subgraph_errors = extract_subgraph_errors(&response, &step.subgraph.name);
    if !subgraph_errors.is_empty() {
        deps.context
            .record_errors(
                subgraph_errors
                    .into_iter()
                    .map(|e| e.prepend_path(&step.insertion_path)),
            )
            .await;
    }

    let entities = response
        .get("data")
        .and_then(|data| data.get("_entities"))
        .and_then(Value::as_array)
        .cloned();

    match entities {
        Some(entities) => {
            let outcome = deps
                .context
                .with_root_data_mut(|root| stitcher::stitch_entities(step, root, &located, entities))
                .await;
            if let Err(error) = outcome {
                deps.context
                    .with_root_data_mut(|root| stitcher::null_entity_locations(root, step, &located))
                    .await;
                return Err(error);
            }
        }
        None => {
            deps.context
                .with_root_data_mut(|root| stitcher::null_entity_locations(root, step, &located))
                .await;
        }
    }

    Ok(())
}

async fn run_step(step: Step, deps: StepDeps) {
    let outcome = if step.is_root() {
        run_root_step(&step, &deps).await
    } else {
        run_entity_step(&step, &deps).await
    };

    if let Err(error) = outcome {
        tracing::warn!(
            request_id = %deps.request_id,
            step = %step.id,
            error = %error,
            "step failed"
        );
        let graphql_error = GraphQlError::new(error.to_string(), &step.subgraph.name).with_path(
            step.error_path()
                .iter()
                .cloned()
                .map(PathSegment::Field)
                .collect(),
        );
        deps.context.record_error(graphql_error).await;
    }

    deps.context.mark_completed(step.id).await;
}

/// Execute a [`Plan`] end to end: validate the DAG, run each dependency
/// wave concurrently, and assemble the final pruned [`GatewayResponse`]
/// (spec §4.1).
pub async fn execute(
    plan: &Plan,
    variables: Value,
    client: Arc<dyn SubgraphClient>,
    supergraph: Arc<dyn SupergraphView>,
    config: &GatewayConfig,
) -> GatewayResponse {
    let request_id = Uuid::new_v4();
    let _span = tracing::info_span!("gateway_execute", %request_id).entered();
    tracing::info!(request_id = %request_id, step_count = plan.steps.len(), "starting execution");

    let waves = match compute_waves(plan) {
        Ok(waves) => waves,
        Err(_) => {
            tracing::warn!(request_id = %request_id, "plan rejected: dependency cycle detected");
            return GatewayResponse::fatal(GraphQlError::new(
                "the execution plan contains a cycle in its step dependencies",
                "gateway",
            ));
        }
    };

    let context = Arc::new(ExecutionContext::new());
    let variables = Arc::new(variables);
    let fragments = Arc::new(plan.fragment_definitions.clone());
    let semaphore = config.max_concurrent_steps.map(|limit| Arc::new(Semaphore::new(limit)));

    for wave in waves {
        let mut join_set = JoinSet::new();
        for step_id in wave {
            let step = plan
                .step(step_id)
                .expect("wave only ever contains known step ids")
                .clone();
            let deps = StepDeps {
                client: Arc::clone(&client),
                supergraph: Arc::clone(&supergraph),
                context: Arc::clone(&context),
                variables: Arc::clone(&variables),
                fragments: Arc::clone(&fragments),
                timeout: config.subgraph_timeout,
                request_id,
            };
            let permit_source = semaphore.clone();
            join_set.spawn(async move {
                let _permit = match &permit_source {
                    Some(sem) => Some(sem.clone().acquire_owned().await.expect("semaphore not closed")),
                    None => None,
                };
                run_step(step, deps).await;
            });
        }
        while join_set.join_next().await.is_some() {}
    }

    let (root_data, errors) = Arc::try_unwrap(context)
        .unwrap_or_else(|_| panic!("all step tasks complete before this point"))
        .into_parts()
        .await;

    let pruned = stitcher::prune_response(&root_data, &plan.original_document, &fragments);
    tracing::info!(request_id = %request_id, error_count = errors.len(), "execution complete");
    GatewayResponse { data: pruned, errors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{ArgValue, OperationKind, Selection, StepType, SubgraphRef};
    use crate::subgraph_client::ClientError;
    use crate::supergraph::{Entity, EntityKey, InMemorySupergraphView};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    struct StubClient {
        responses: StdMutex<HashMap<String, Value>>,
    }

    #[async_trait]
    impl SubgraphClient for StubClient {
        async fn send(
            &self,
            endpoint: &str,
            _body: SubgraphRequestBody,
            _ctx: &RequestContext,
        ) -> std::result::Result<Value, ClientError> {
            self.responses
                .lock()
                .unwrap()
                .get(endpoint)
                .cloned()
                .ok_or_else(|| ClientError::new(format!("no stub for {}", endpoint)))
        }
    }

    fn two_subgraph_plan() -> Plan {
        Plan {
            steps: vec![
                Step {
                    id: StepId(0),
                    subgraph: SubgraphRef {
                        name: "products".to_string(),
                        endpoint: "http://products".to_string(),
                    },
                    step_type: StepType::RootOperation,
                    parent_type: None,
                    selection_set: vec![Selection::Field {
                        name: "product".to_string(),
                        alias: None,
                        arguments: vec![("id".to_string(), ArgValue::Variable("id".to_string()))],
                        selection_set: Some(vec![
                            Selection::Field {
                                name: "upc".to_string(),
                                alias: None,
                                arguments: vec![],
                                selection_set: None,
                            },
                            Selection::Field {
                                name: "name".to_string(),
                                alias: None,
                                arguments: vec![],
                                selection_set: None,
                            },
                        ]),
                    }],
                    depends_on: Default::default(),
                    path: vec!["product".to_string()],
                    insertion_path: vec![],
                    operation_kind: OperationKind::Query,
                },
                Step {
                    id: StepId(1),
                    subgraph: SubgraphRef {
                        name: "inventory".to_string(),
                        endpoint: "http://inventory".to_string(),
                    },
                    step_type: StepType::EntityFetch,
                    parent_type: Some("Product".to_string()),
                    selection_set: vec![Selection::Field {
                        name: "inStock".to_string(),
                        alias: None,
                        arguments: vec![],
                        selection_set: None,
                    }],
                    depends_on: [StepId(0)].into_iter().collect(),
                    path: vec![],
                    insertion_path: vec!["product".to_string()],
                    operation_kind: OperationKind::Query,
                },
            ],
            root_step_indexes: vec![StepId(0)],
            original_document: crate::plan::OriginalDocument {
                selection_set: vec![Selection::Field {
                    name: "product".to_string(),
                    alias: None,
                    arguments: vec![],
                    selection_set: Some(vec![
                        Selection::Field {
                            name: "name".to_string(),
                            alias: None,
                            arguments: vec![],
                            selection_set: None,
                        },
                        Selection::Field {
                            name: "inStock".to_string(),
                            alias: None,
                            arguments: vec![],
                            selection_set: None,
                        },
                    ]),
                }],
            },
            fragment_definitions: vec![],
        }
    }

    fn supergraph() -> InMemorySupergraphView {
        InMemorySupergraphView::new().with_entity(
            SubgraphRef {
                name: "inventory".to_string(),
                endpoint: "http://inventory".to_string(),
            },
            Entity {
                type_name: "Product".to_string(),
                keys: vec![EntityKey::parse("upc")],
            },
        )
    }

    #[tokio::test]
    async fn executes_two_waves_and_prunes_key_fields() {
        let plan = two_subgraph_plan();
        let mut responses = HashMap::new();
        responses.insert(
            "http://products".to_string(),
            json!({"data": {"product": {"upc": "1", "name": "Table"}}}),
        );
        responses.insert(
            "http://inventory".to_string(),
            json!({"data": {"_entities": [{"inStock": true}]}}),
        );
        let client = Arc::new(StubClient {
            responses: StdMutex::new(responses),
        });

        let response = execute(
            &plan,
            json!({"id": "1"}),
            client,
            Arc::new(supergraph()),
            &GatewayConfig::default(),
        )
        .await;

        assert!(response.errors.is_empty());
        assert_eq!(response.data["product"]["name"], "Table");
        assert_eq!(response.data["product"]["inStock"], true);
        assert!(response.data["product"].get("upc").is_none());
    }

    #[tokio::test]
    async fn transport_failure_on_entity_step_is_recorded_and_nulls_field() {
        let plan = two_subgraph_plan();
        let mut responses = HashMap::new();
        responses.insert(
            "http://products".to_string(),
            json!({"data": {"product": {"upc": "1", "name": "Table"}}}),
        );
        let client = Arc::new(StubClient {
            responses: StdMutex::new(responses),
        });

        let response = execute(
            &plan,
            json!({"id": "1"}),
            client,
            Arc::new(supergraph()),
            &GatewayConfig::default(),
        )
        .await;

        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.data["product"]["name"], "Table");
        assert_eq!(response.data["product"]["inStock"], Value::Null);
    }

    #[tokio::test]
    async fn cyclic_plan_is_rejected_before_any_request() {
        let mut plan = two_subgraph_plan();
        plan.steps[0].depends_on.insert(StepId(1));
        let client = Arc::new(StubClient {
            responses: StdMutex::new(HashMap::new()),
        });

        let response = execute(
            &plan,
            Value::Null,
            client,
            Arc::new(supergraph()),
            &GatewayConfig::default(),
        )
        .await;

        assert_eq!(response.data, Value::Null);
        assert_eq!(response.errors.len(), 1);
    }
}
