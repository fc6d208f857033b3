//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! rebroadcaster. All types derive Serde traits for deserialization from
//! config files. Secret material is not part of the schema; see
//! [`crate::config::loader::Secrets`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::solana::{Commitment, ConfirmOptions};

/// Default tick interval: 37 minutes.
pub const DEFAULT_INTERVAL_SECS: u64 = 37 * 60;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RebroadcastConfig {
    /// Ledger RPC endpoint and submission settings.
    pub rpc: RpcConfig,

    /// Tick interval and overlap handling.
    pub schedule: ScheduleConfig,

    /// Block explorer used for log links.
    pub explorer: ExplorerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// RPC configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// JSON-RPC endpoint URL. Usually supplied through `CUSTOM_RPC_URL`.
    pub url: String,

    /// Failover endpoint URLs, tried in order.
    pub failover_urls: Vec<String>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Commitment level to confirm at (also used for preflight).
    pub commitment: Commitment,

    /// Skip the node's preflight simulation.
    pub skip_preflight: bool,

    /// Overall deadline for confirmation in seconds.
    pub confirm_timeout_secs: u64,

    /// Signature status polling interval in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            failover_urls: Vec::new(),
            timeout_secs: 30,
            commitment: Commitment::Confirmed,
            skip_preflight: false,
            confirm_timeout_secs: 90,
            poll_interval_ms: 2000,
        }
    }
}

impl RpcConfig {
    pub fn confirm_options(&self) -> ConfirmOptions {
        ConfirmOptions {
            skip_preflight: self.skip_preflight,
            commitment: self.commitment,
            timeout: Duration::from_secs(self.confirm_timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

/// What to do when a tick fires while an attempt is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Skip the tick; at most one attempt is in flight.
    #[default]
    Skip,
    /// Start another attempt alongside the running one.
    Concurrent,
}

/// Scheduling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Seconds between attempts. The first attempt runs immediately.
    pub interval_secs: u64,

    /// Overlap handling.
    pub overlap: OverlapPolicy,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            overlap: OverlapPolicy::Skip,
        }
    }
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Explorer link configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Explorer base URL.
    pub base_url: String,

    /// Cluster query parameter; empty to omit.
    pub cluster: String,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://explorer.solana.com".to_string(),
            cluster: "mainnet-beta".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins if set.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RebroadcastConfig::default();
        assert_eq!(config.schedule.interval(), Duration::from_secs(2220));
        assert_eq!(config.schedule.overlap, OverlapPolicy::Skip);
        assert_eq!(config.rpc.commitment, Commitment::Confirmed);
        assert!(!config.rpc.skip_preflight);
        assert!(config.rpc.url.is_empty());
    }

    #[test]
    fn test_partial_toml() {
        let config: RebroadcastConfig = toml::from_str(
            r#"
            [rpc]
            url = "http://localhost:8899"
            commitment = "finalized"

            [schedule]
            interval_secs = 60
            overlap = "concurrent"
            "#,
        )
        .unwrap();
        assert_eq!(config.rpc.commitment, Commitment::Finalized);
        assert_eq!(config.rpc.timeout_secs, 30);
        assert_eq!(config.schedule.overlap, OverlapPolicy::Concurrent);
        assert_eq!(config.explorer.cluster, "mainnet-beta");
    }

    #[test]
    fn test_confirm_options() {
        let rpc = RpcConfig {
            poll_interval_ms: 500,
            confirm_timeout_secs: 10,
            ..RpcConfig::default()
        };
        let options = rpc.confirm_options();
        assert_eq!(options.poll_interval, Duration::from_millis(500));
        assert_eq!(options.timeout, Duration::from_secs(10));
    }
}
