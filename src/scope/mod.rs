//! Request execution scopes.
//!
//! # Data Flow
//! ```text
//! Scope::background()
//!     → with_cancel()        (root scope per inbound request)
//!     → with_timeout(T)      (bounded scope, deadline = min(parent, now + T))
//!     → handlers observe is_cancelled() / cancelled().await
//!
//! ReleaseHandle::release() / Drop
//!     → cancels the derived scope and everything derived from it
//! ```
//!
//! # Design Decisions
//! - Flat struct with an explicit parent link, no inheritance
//! - Cancellation is monotonic and flows parent → child only
//! - Expiry is observed lazily; no timer task is spawned per scope
//! - The first observed cause (canceled / deadline exceeded) is sticky

pub mod error;
pub mod handle;
pub mod release;

pub use error::ScopeError;
pub use handle::Scope;
pub use release::ReleaseHandle;
