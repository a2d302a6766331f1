//! # Gateway configuration (ambient)
//!
//! Grounded in the teacher's `config::WorkflowConfig::from_env` — a struct
//! populated from `GATEWAY_`-prefixed environment variables with typed
//! defaults, plus a dedicated error enum for malformed values rather than
//! panicking on a bad `parse()`.

use std::env;
use std::time::Duration;

use thiserror::Error;

/// Tunables for a running gateway, independent of any single `Plan`.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    /// Per-subgraph-request timeout passed to the injected `SubgraphClient`
    /// via `RequestContext::with_timeout`.
    pub subgraph_timeout: Duration,
    /// Upper bound on steps dispatched concurrently within a single wave.
    /// `None` means unbounded (spec §5: waves run "concurrently").
    pub max_concurrent_steps: Option<usize>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            subgraph_timeout: Duration::from_secs(10),
            max_concurrent_steps: None,
        }
    }
}

/// A `GATEWAY_*` environment variable held a value that could not be parsed
/// into its expected type.
#[derive(Debug, Error)]
#[error("invalid value for {variable}: {message}")]
pub struct ConfigError {
    pub variable: &'static str,
    pub message: String,
}

impl GatewayConfig {
    /// Build a config from `GATEWAY_SUBGRAPH_TIMEOUT_MS` and
    /// `GATEWAY_MAX_CONCURRENT_STEPS`, falling back to
    /// [`GatewayConfig::default`] for any variable that is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(raw) = env::var("GATEWAY_SUBGRAPH_TIMEOUT_MS") {
            let millis: u64 = raw.parse().map_err(|_| ConfigError {
                variable: "GATEWAY_SUBGRAPH_TIMEOUT_MS",
                message: format!("{:?} is not a valid integer", raw),
            })?;
            config.subgraph_timeout = Duration::from_millis(millis);
        }

        if let Ok(raw) = env::var("GATEWAY_MAX_CONCURRENT_STEPS") {
            let limit: usize = raw.parse().map_err(|_| ConfigError {
                variable: "GATEWAY_MAX_CONCURRENT_STEPS",
                message: format!("{:?} is not a valid integer", raw),
            })?;
            config.max_concurrent_steps = Some(limit);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env_overrides() {
        let config = GatewayConfig::default();
        assert_eq!(config.subgraph_timeout, Duration::from_secs(10));
        assert_eq!(config.max_concurrent_steps, None);
    }

    #[test]
    fn rejects_non_numeric_timeout() {
        env::set_var("GATEWAY_SUBGRAPH_TIMEOUT_MS", "not-a-number");
        let result = GatewayConfig::from_env();
        env::remove_var("GATEWAY_SUBGRAPH_TIMEOUT_MS");
        assert!(result.is_err());
    }
}
