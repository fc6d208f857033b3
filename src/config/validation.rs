//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals and timeouts > 0)
//! - Validate URLs and bind addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RebroadcastConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::RebroadcastConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("rpc.url is required (set CUSTOM_RPC_URL)")]
    MissingRpcUrl,

    #[error("{field} is not a valid http(s) URL: {reason}")]
    InvalidUrl { field: String, reason: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("rpc.poll_interval_ms must be shorter than rpc.confirm_timeout_secs")]
    PollIntervalTooLong,

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

pub fn validate_config(config: &RebroadcastConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.rpc.url.trim().is_empty() {
        errors.push(ValidationError::MissingRpcUrl);
    } else if let Err(e) = check_url("rpc.url", &config.rpc.url) {
        errors.push(e);
    }
    for (i, url) in config.rpc.failover_urls.iter().enumerate() {
        if let Err(e) = check_url(&format!("rpc.failover_urls[{}]", i), url) {
            errors.push(e);
        }
    }
    if let Err(e) = check_url("explorer.base_url", &config.explorer.base_url) {
        errors.push(e);
    }

    if config.schedule.interval_secs == 0 {
        errors.push(ValidationError::Zero("schedule.interval_secs"));
    }
    if config.rpc.timeout_secs == 0 {
        errors.push(ValidationError::Zero("rpc.timeout_secs"));
    }
    if config.rpc.confirm_timeout_secs == 0 {
        errors.push(ValidationError::Zero("rpc.confirm_timeout_secs"));
    }
    if config.rpc.poll_interval_ms == 0 {
        errors.push(ValidationError::Zero("rpc.poll_interval_ms"));
    } else if config.rpc.poll_interval_ms >= config.rpc.confirm_timeout_secs.saturating_mul(1000)
        && config.rpc.confirm_timeout_secs > 0
    {
        errors.push(ValidationError::PollIntervalTooLong);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(field: &str, value: &str) -> Result<(), ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidUrl {
        field: field.to_string(),
        reason,
    };
    let url = Url::parse(value).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}
