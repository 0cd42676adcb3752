//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and addresses.
//! All problems are collected instead of stopping at the first one.

use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::uri::Authority;

use crate::config::schema::ServiceConfig;

/// Largest accepted upper bound (one day).
pub const MAX_UPPER_BOUND_SECS: u64 = 24 * 60 * 60;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    BindAddress(String),
    #[error("upstream.address {0:?} is not a valid authority")]
    UpstreamAddress(String),
    #[error("upstream.connect_timeout_secs must be greater than 0")]
    ConnectTimeout,
    #[error("timeouts.upper_bound_secs must be between 1 and {max}, got {0}", max = MAX_UPPER_BOUND_SECS)]
    UpperBound(u64),
    #[error("timeouts.inbound_timeout_secs must be greater than 0")]
    InboundTimeout,
    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),
    #[error("security.max_body_size must be greater than 0")]
    MaxBodySize,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.upstream.address.is_empty() || Authority::from_str(&config.upstream.address).is_err()
    {
        errors.push(ValidationError::UpstreamAddress(config.upstream.address.clone()));
    }
    if config.upstream.connect_timeout_secs == 0 {
        errors.push(ValidationError::ConnectTimeout);
    }

    let upper_bound = config.timeouts.upper_bound_secs;
    if upper_bound == 0 || upper_bound > MAX_UPPER_BOUND_SECS {
        errors.push(ValidationError::UpperBound(upper_bound));
    }
    if config.timeouts.inbound_timeout_secs == Some(0) {
        errors.push(ValidationError::InboundTimeout);
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::MaxBodySize);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
