//! Request deadline subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request (scope in extensions, query string)
//!     → parser.rs (`timeout` query value → UserTimeout)
//!     → combinator.rs (UserTimeout + upper bound → target timeout)
//!     → deriver.rs (parent.with_timeout(target) → Scope + ReleaseHandle)
//! ```
//!
//! # Design Decisions
//! - Never fails the request: bad input degrades to the upper bound
//! - A valid user timeout is honored even past the upper bound
//! - The parent's earlier deadline is never weakened
//! - Stateless: each derivation is independent

pub mod combinator;
pub mod deriver;
pub mod parser;

pub use combinator::{select_timeout, TimeoutSelection, TimeoutSource};
pub use deriver::{
    derive_bounded_scope, request_scope_with_upper_bound, BoundedScope, DeadlineOrigin,
    ScopedRequest,
};
pub use parser::{parse_duration, timeout_query_value, DurationError, UserTimeout};
