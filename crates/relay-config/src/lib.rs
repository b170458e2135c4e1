//! Ambient engine configuration: the knobs that govern parallelism,
//! timeouts, and retry/loop/subworkflow defaults, loaded from environment
//! variables rather than a file.
//!
//! Grounded on the teacher's own `config` crate for shape only — its
//! hot-reload/watcher machinery (`crates/config/src/core/config.rs`) is
//! disproportionate to a handful of engine-wide constants here, so this is
//! a plain `serde`-deserialized struct instead. The loading mechanism comes
//! from the real `config` crate (crates.io's `config-rs`, not the
//! teacher's own internal crate of the same name): only its `Environment`
//! source is used, since the workspace pins `config` with
//! `default-features = false` and no file-format parser features enabled.

use std::time::Duration;

use relay_error::RelayError;
use serde::{Deserialize, Serialize};

/// Engine-wide defaults (§4.3, §4.5, §6.1). Every field has a sensible
/// default; `from_env` only needs to override the ones an embedder cares
/// about, via `RELAY_<FIELD>` environment variables (e.g.
/// `RELAY_MAX_PARALLEL_BRANCHES=20`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_parallel_branches: usize,
    pub max_concurrent_executions: usize,
    pub execution_timeout_ms: u64,
    pub http_node_timeout_ms: u64,
    pub delay_node_max_wait_ms: u64,
    pub log_ring_capacity: usize,
    pub retry_max_attempts: u32,
    pub retry_initial_delay_ms: u64,
    pub retry_backoff_multiplier: f64,
    pub loop_max_iterations: u64,
    pub subworkflow_depth_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallel_branches: 10,
            max_concurrent_executions: 100,
            execution_timeout_ms: 300_000,
            http_node_timeout_ms: 30_000,
            delay_node_max_wait_ms: 30_000,
            log_ring_capacity: 1000,
            retry_max_attempts: 3,
            retry_initial_delay_ms: 100,
            retry_backoff_multiplier: 2.0,
            loop_max_iterations: 1000,
            subworkflow_depth_limit: 5,
        }
    }
}

impl EngineConfig {
    /// Loads config from `RELAY_*` environment variables layered over the
    /// defaults above. Missing variables simply leave the default in place.
    pub fn from_env() -> Result<Self, RelayError> {
        let built = config::Config::builder()
            .add_source(config::Environment::with_prefix("RELAY").separator("_"))
            .build()
            .map_err(|e| RelayError::internal(format!("failed to build engine config: {e}")))?;

        // Missing env vars leave their field unset in `built`; `#[serde(default)]`
        // on `EngineConfig` fills those in from `Default::default()` at
        // deserialization time rather than requiring every key to be present.
        let config: Self = built
            .try_deserialize()
            .map_err(|e| RelayError::internal(format!("failed to deserialize engine config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RelayError> {
        if self.max_parallel_branches < 1 {
            return Err(RelayError::validation("max_parallel_branches must be at least 1"));
        }
        if self.max_concurrent_executions < 1 {
            return Err(RelayError::validation("max_concurrent_executions must be at least 1"));
        }
        if self.retry_backoff_multiplier < 1.0 {
            return Err(RelayError::validation("retry_backoff_multiplier must be at least 1.0"));
        }
        Ok(())
    }

    #[must_use]
    pub fn execution_timeout(&self) -> Duration {
        Duration::from_millis(self.execution_timeout_ms)
    }

    #[must_use]
    pub fn http_node_timeout(&self) -> Duration {
        Duration::from_millis(self.http_node_timeout_ms)
    }

    #[must_use]
    pub fn delay_node_max_wait(&self) -> Duration {
        Duration::from_millis(self.delay_node_max_wait_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_expected_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.max_parallel_branches, 10);
        assert_eq!(cfg.max_concurrent_executions, 100);
        assert_eq!(cfg.subworkflow_depth_limit, 5);
        assert_eq!(cfg.loop_max_iterations, 1000);
    }

    #[test]
    fn defaults_pass_validation() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_parallelism_is_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.max_parallel_branches = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn sub_unity_backoff_multiplier_is_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.retry_backoff_multiplier = 0.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn accessors_convert_millis_to_duration() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.execution_timeout(), Duration::from_secs(300));
    }
}
