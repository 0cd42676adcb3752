//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the forward handler
//! - Wire up middleware (request ID, tracing, body limit, request scopes)
//! - Forward requests to the configured upstream within their scope
//! - Apply hot-reloaded timeout settings

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{
        uri::{Authority, PathAndQuery, Scheme},
        HeaderValue, Request, StatusCode, Uri,
    },
    middleware::from_fn_with_state,
    response::Response,
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{ServiceConfig, TimeoutConfig};
use crate::http::middleware::{attach_request_scope, enforce_request_deadline};
use crate::http::request::{RequestIdExt, UuidRequestId};
use crate::http::response::error_response;
use crate::scope::Scope;

/// Header telling the upstream how much of the request's budget is left.
pub const X_DEADLINE_REMAINING_MS: &str = "x-deadline-remaining-ms";

/// Error type for server construction and execution.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid upstream address {address:?}: {source}")]
    InvalidUpstream {
        address: String,
        source: axum::http::uri::InvalidUri,
    },
    #[error("server IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub client: Client<HttpConnector, Body>,
    pub upstream: Authority,
    pub timeouts: Arc<ArcSwap<TimeoutConfig>>,
}

/// HTTP server fronting one upstream.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
    timeouts: Arc<ArcSwap<TimeoutConfig>>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServiceConfig) -> Result<Self, ServerError> {
        let upstream = Authority::from_str(&config.upstream.address).map_err(|source| {
            ServerError::InvalidUpstream {
                address: config.upstream.address.clone(),
                source,
            }
        })?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(
            config.upstream.connect_timeout_secs,
        )));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let timeouts = Arc::new(ArcSwap::from_pointee(config.timeouts.clone()));
        let state = AppState {
            client,
            upstream,
            timeouts: timeouts.clone(),
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            timeouts,
        })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers run top to bottom on the way in.
    fn build_router(config: &ServiceConfig, state: AppState) -> Router {
        Router::new()
            .route("/", any(forward_handler))
            .route("/{*path}", any(forward_handler))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(from_fn_with_state(state.clone(), attach_request_scope))
                    .layer(from_fn_with_state(state.clone(), enforce_request_deadline))
                    // Innermost: the scope middleware takes `Request<Body>`, not a limited body.
                    .layer(RequestBodyLimitLayer::new(config.security.max_body_size)),
            )
            .with_state(state)
    }

    /// Run the server until `shutdown` fires, applying timeout updates from
    /// `config_updates` as they arrive.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ServiceConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            upper_bound_secs = self.config.timeouts.upper_bound_secs,
            "HTTP server starting"
        );

        let timeouts = self.timeouts.clone();
        let reload = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                tracing::info!(
                    upper_bound_secs = config.timeouts.upper_bound_secs,
                    inbound_timeout_secs = ?config.timeouts.inbound_timeout_secs,
                    "Applying reloaded timeout settings"
                );
                timeouts.store(Arc::new(config.timeouts));
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        reload.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Timeout settings currently in effect.
    pub fn timeouts(&self) -> Arc<TimeoutConfig> {
        self.timeouts.load_full()
    }
}

/// Forward the request to the upstream, telling it the remaining budget.
async fn forward_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = request.request_id().to_string();
    let (mut parts, body) = request.into_parts();

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(state.upstream.clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to build upstream URI");
            return error_response(StatusCode::BAD_GATEWAY, "invalid upstream uri", &request_id);
        }
    };

    if let Some(remaining) = parts.extensions.get::<Scope>().and_then(Scope::remaining) {
        let millis = u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX);
        parts
            .headers
            .insert(X_DEADLINE_REMAINING_MS, HeaderValue::from(millis));
    }

    tracing::debug!(
        request_id = %request_id,
        method = %parts.method,
        uri = %parts.uri,
        "Forwarding request"
    );

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Upstream error");
            error_response(StatusCode::BAD_GATEWAY, "upstream request failed", &request_id)
        }
    }
}
