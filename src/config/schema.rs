//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML and every
//! field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ledger::types::CommitmentLevel;

/// Root configuration for the submission engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Ledger node endpoints.
    pub rpc: RpcConfig,

    /// Submission and confirmation tuning.
    pub submission: SubmissionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Ledger node connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs, tried in order.
    pub failover_urls: Vec<String>,

    /// Websocket endpoint; derived from `rpc_url` when absent.
    pub ws_url: Option<String>,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8899".to_string(),
            failover_urls: Vec::new(),
            ws_url: None,
            request_timeout_secs: 10,
        }
    }
}

/// Submission engine timing and policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// How long to wait for a terminal confirmation signal.
    pub confirm_timeout_ms: u64,

    /// Interval between resends of the same signed bytes.
    pub resend_interval_ms: u64,

    /// Interval between status polls.
    pub poll_interval_ms: u64,

    /// Commitment level to wait for.
    pub commitment: CommitmentLevel,

    /// Dry-run timed-out transactions to extract a program error.
    pub simulate_on_timeout: bool,
}

impl SubmissionConfig {
    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }

    pub fn resend_interval(&self) -> Duration {
        Duration::from_millis(self.resend_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            confirm_timeout_ms: 60_000,
            resend_interval_ms: 500,
            poll_interval_ms: 2_000,
            commitment: CommitmentLevel::Confirmed,
            simulate_on_timeout: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
