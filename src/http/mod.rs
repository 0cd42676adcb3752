//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layer stack)
//!     → request.rs (request ID)
//!     → middleware.rs (root scope, then bounded deadline)
//!     → server.rs forward handler (upstream call within the scope)
//!     → response.rs (service-generated error bodies)
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestIdExt, UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer, ServerError, X_DEADLINE_REMAINING_MS};
