//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files, and
//! every section falls back to its defaults so minimal configs stay valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream that requests are forwarded to.
    pub upstream: UpstreamConfig,

    /// Request deadline configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Request hardening.
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream authority (e.g., "127.0.0.1:3000").
    pub address: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
            connect_timeout_secs: 5,
        }
    }
}

/// Deadline configuration applied to every inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Ceiling in seconds used when the request carries no valid `timeout`.
    pub upper_bound_secs: u64,

    /// Optional timeout in seconds attached when the request scope is
    /// created, ahead of the bounded-deadline stage.
    pub inbound_timeout_secs: Option<u64>,
}

impl TimeoutConfig {
    pub fn upper_bound(&self) -> Duration {
        Duration::from_secs(self.upper_bound_secs)
    }

    pub fn inbound_timeout(&self) -> Option<Duration> {
        self.inbound_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            upper_bound_secs: 60,
            inbound_timeout_secs: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}
