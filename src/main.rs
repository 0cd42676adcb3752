//! scoped-deadline service.
//!
//! Forwards HTTP requests to one upstream, guaranteeing every request a
//! deadline even when nothing earlier in the pipeline set one.
//!
//! ```text
//!   client ──▶ request id ──▶ root scope ──▶ bounded deadline ──▶ upstream
//!                              (inbound      (user `timeout`,
//!                               timeout)      else upper bound)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use scoped_deadline::config::validation::validate_config;
use scoped_deadline::config::watcher::ConfigWatcher;
use scoped_deadline::config::{
    load_config_with, ConfigError, ConfigOverrides, ServiceConfig,
};
use scoped_deadline::lifecycle::signals::wait_for_signal;
use scoped_deadline::observability::{logging, metrics};
use scoped_deadline::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "scoped-deadline")]
#[command(about = "HTTP forwarder that bounds every request with a deadline", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file (watched for changes).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `timeouts.upper_bound_secs`.
    #[arg(long)]
    upper_bound_secs: Option<u64>,

    /// Override `listener.bind_address`.
    #[arg(long)]
    bind: Option<String>,

    /// Override `upstream.address`.
    #[arg(long)]
    upstream: Option<String>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            bind_address: self.bind.clone(),
            upstream_address: self.upstream.clone(),
            upper_bound_secs: self.upper_bound_secs,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let overrides = cli.overrides();

    let config = match &cli.config {
        Some(path) => load_config_with(path, &overrides)?,
        None => {
            let mut config = ServiceConfig::default();
            overrides.apply(&mut config);
            validate_config(&config).map_err(ConfigError::Validation)?;
            config
        }
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!("scoped-deadline v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        upper_bound_secs = config.timeouts.upper_bound_secs,
        inbound_timeout_secs = ?config.timeouts.inbound_timeout_secs,
        overridden = !overrides.is_empty(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    // The watcher must outlive the server; without a file there is nothing to watch.
    let (_watcher, config_updates) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path, overrides);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server = HttpServer::new(config)?;
    let server_task = tokio::spawn(server.run(listener, config_updates, server_shutdown));

    wait_for_signal().await;
    shutdown.trigger();
    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
