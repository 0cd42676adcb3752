//! Responses produced by the service itself rather than the upstream.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::scope::ScopeError;

/// Non-standard status for requests the client abandoned.
const CLIENT_CLOSED_REQUEST: u16 = 499;

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    request_id: &'a str,
}

/// Response for a request whose scope ended before the handler finished.
pub fn scope_ended(cause: ScopeError, request_id: &str) -> Response {
    let status = match cause {
        ScopeError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        ScopeError::Canceled => {
            StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::SERVICE_UNAVAILABLE)
        }
    };
    error_response(status, &cause.to_string(), request_id)
}

/// JSON error body with the request ID attached.
pub fn error_response(status: StatusCode, message: &str, request_id: &str) -> Response {
    let body = ErrorBody {
        error: message,
        request_id,
    };
    (status, Json(body)).into_response()
}
