use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use scoped_deadline::deadline::{derive_bounded_scope, parse_duration, UserTimeout};
use scoped_deadline::http::X_REQUEST_ID;
use scoped_deadline::Scope;

#[derive(Parser)]
#[command(name = "deadline-cli")]
#[command(about = "Inspect how request deadlines are resolved", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a `timeout` value against an upper bound without any server
    Resolve {
        /// Raw `timeout` query value (omit to simulate an absent parameter)
        #[arg(short, long)]
        timeout: Option<String>,

        /// Upper bound, in the same duration syntax (e.g. 60s)
        #[arg(short, long, default_value = "60s")]
        upper_bound: String,

        /// Deadline already on the parent scope, relative to now
        #[arg(short, long)]
        parent: Option<String>,
    },
    /// Send a request through a running service and report the outcome
    Probe {
        #[arg(short, long, default_value = "http://localhost:8080/")]
        url: String,

        /// Value for the `timeout` query parameter
        #[arg(short, long)]
        timeout: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve {
            timeout,
            upper_bound,
            parent,
        } => resolve(timeout, &upper_bound, parent.as_deref())?,
        Commands::Probe { url, timeout } => probe(&url, timeout).await?,
    }

    Ok(())
}

fn resolve(
    timeout: Option<String>,
    upper_bound: &str,
    parent: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let upper_bound = parse_duration(upper_bound)?;
    let parent = parent.map(parse_duration).transpose()?;

    let report = resolve_report(timeout.as_deref(), upper_bound, parent);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Describe how a request with `timeout` would be bounded.
fn resolve_report(
    timeout: Option<&str>,
    upper_bound: Duration,
    parent: Option<Duration>,
) -> Value {
    let root = Scope::background();
    let (parent_scope, _parent_release) = match parent {
        Some(budget) => root.with_timeout(budget),
        None => root.with_cancel(),
    };

    let query = timeout.map(|value| {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("timeout", value)
            .finish()
    });
    let bounded = derive_bounded_scope(&parent_scope, query.as_deref(), upper_bound);

    json!({
        "user_timeout": bounded.user_timeout.outcome(),
        "user_timeout_ms": bounded.user_timeout.duration().map(millis),
        "selected_source": bounded.selection.source.as_str(),
        "selected_ms": millis(bounded.selection.duration),
        "origin": bounded.origin.as_str(),
        "remaining_ms": bounded.scope.remaining().map(millis),
    })
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

async fn probe(url: &str, timeout: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();
    let mut request = client.get(url);
    if let Some(value) = &timeout {
        request = request.query(&[("timeout", value)]);
        if let UserTimeout::Valid(d) = UserTimeout::from_value(value) {
            // Leave the server room to answer before we give up ourselves.
            request = request.timeout(d + Duration::from_secs(5));
        }
    }

    let started = Instant::now();
    let res = request.send().await?;
    let status = res.status();
    let request_id = res
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = res.text().await.unwrap_or_default();

    let report = json!({
        "status": status.as_u16(),
        "elapsed_ms": millis(started.elapsed()),
        "request_id": request_id,
        "body": body,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_user_timeout_beyond_upper_bound() {
        let report = resolve_report(Some("5m2s"), Duration::from_secs(60), None);

        assert_eq!(report["user_timeout"], "valid");
        assert_eq!(report["user_timeout_ms"], 302_000);
        assert_eq!(report["selected_source"], "user_timeout");
        assert_eq!(report["selected_ms"], 302_000);
        assert_eq!(report["origin"], "user_timeout");
        let remaining = report["remaining_ms"].as_u64().unwrap();
        assert!(remaining > 300_000 && remaining <= 302_000);
    }

    #[test]
    fn test_resolve_malformed_timeout_under_earlier_parent() {
        let report = resolve_report(
            Some("invalid"),
            Duration::from_secs(60),
            Some(Duration::from_secs(10)),
        );

        assert_eq!(report["user_timeout"], "malformed");
        assert!(report["user_timeout_ms"].is_null());
        assert_eq!(report["selected_source"], "upper_bound");
        assert_eq!(report["selected_ms"], 60_000);
        assert_eq!(report["origin"], "inherited");
        assert!(report["remaining_ms"].as_u64().unwrap() <= 10_000);
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1_500)), 1_500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
