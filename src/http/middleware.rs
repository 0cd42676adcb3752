//! Request scope middleware.
//!
//! Two stages run in order for every request:
//! 1. `attach_request_scope` creates the root scope, optionally with the
//!    configured inbound timeout, and releases it when the request finishes
//!    or its future is dropped.
//! 2. `enforce_request_deadline` derives the bounded scope from it and cuts
//!    the request off when that scope ends first.

use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::deadline::{derive_bounded_scope, ScopedRequest};
use crate::http::request::RequestIdExt;
use crate::http::response;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::scope::Scope;

pub async fn attach_request_scope(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let root = Scope::background();
    let (scope, _release) = match state.timeouts.load().inbound_timeout() {
        Some(timeout) => root.with_timeout(timeout),
        None => root.with_cancel(),
    };

    req.extensions_mut().insert(scope);
    next.run(req).await
}

pub async fn enforce_request_deadline(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let start_time = Instant::now();
    let request_id = req.request_id().to_string();
    let method = req.method().to_string();
    let upper_bound = state.timeouts.load().upper_bound();

    let parent = req.scope().cloned().unwrap_or_default();
    let bounded = derive_bounded_scope(&parent, req.raw_query(), upper_bound);
    let origin = bounded.origin;
    metrics::record_scope_derived(origin, &bounded.user_timeout);

    let (scope, _release) = bounded.into_parts();
    req.extensions_mut().insert(scope.clone());

    let response = tokio::select! {
        response = next.run(req) => response,
        cause = scope.cancelled() => {
            tracing::warn!(
                request_id = %request_id,
                origin = origin.as_str(),
                cause = %cause,
                elapsed = ?start_time.elapsed(),
                "Request scope ended before the handler finished"
            );
            metrics::record_deadline_exceeded(origin);
            response::scope_ended(cause, &request_id)
        }
    };

    metrics::record_request(&method, response.status().as_u16(), start_time);
    response
}
