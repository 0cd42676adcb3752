//! Bounded request deadlines for HTTP services.
//!
//! Every inbound request gets an execution [`Scope`] whose deadline is the
//! earliest of: the deadline already on the request's scope, the user's
//! `timeout` query parameter, or (only when that parameter is missing or
//! unusable) a configured upper bound.

pub mod config;
pub mod deadline;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod scope;

pub use config::ServiceConfig;
pub use deadline::{request_scope_with_upper_bound, ScopedRequest};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use scope::{ReleaseHandle, Scope, ScopeError};
