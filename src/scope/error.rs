//! Cancellation causes.

/// Why a scope stopped being live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    /// The scope (or an ancestor) was released or cancelled explicitly.
    #[error("scope canceled")]
    Canceled,
    /// The effective deadline elapsed.
    #[error("scope deadline exceeded")]
    DeadlineExceeded,
}
