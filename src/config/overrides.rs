//! Command-line overrides layered over the file configuration.
//!
//! Overrides are applied to every configuration the process uses, the one
//! read at startup and each one the watcher reloads, before validation.

use crate::config::schema::ServiceConfig;

/// Values that replace their file counterparts when set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub bind_address: Option<String>,
    pub upstream_address: Option<String>,
    pub upper_bound_secs: Option<u64>,
}

impl ConfigOverrides {
    /// Replace the overridden fields of `config`.
    pub fn apply(&self, config: &mut ServiceConfig) {
        if let Some(bind) = &self.bind_address {
            config.listener.bind_address = bind.clone();
        }
        if let Some(upstream) = &self.upstream_address {
            config.upstream.address = upstream.clone();
        }
        if let Some(secs) = self.upper_bound_secs {
            config.timeouts.upper_bound_secs = secs;
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
