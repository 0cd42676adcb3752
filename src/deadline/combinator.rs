//! Target timeout selection.
//!
//! A valid user timeout always wins, even when it is longer than the upper
//! bound. The upper bound only stands in when the user supplied nothing
//! usable. The parent scope's deadline is not consulted here; it is folded
//! in when the scope is derived.

use std::time::Duration;

use crate::deadline::parser::UserTimeout;

/// Where the target timeout came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutSource {
    UserTimeout,
    UpperBound,
}

impl TimeoutSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserTimeout => "user_timeout",
            Self::UpperBound => "upper_bound",
        }
    }
}

/// Timeout to apply from "now" for one derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutSelection {
    pub duration: Duration,
    pub source: TimeoutSource,
}

/// Pick the timeout for this derivation step.
pub fn select_timeout(upper_bound: Duration, user: &UserTimeout) -> TimeoutSelection {
    match user.duration() {
        Some(duration) => TimeoutSelection {
            duration,
            source: TimeoutSource::UserTimeout,
        },
        None => TimeoutSelection {
            duration: upper_bound,
            source: TimeoutSource::UpperBound,
        },
    }
}
