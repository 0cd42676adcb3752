//! Structured logging setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies to this
/// crate and to tower-http.
pub fn init_logging(default_level: &str) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("scoped_deadline={default_level},tower_http={default_level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
