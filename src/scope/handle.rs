//! Cancellable execution scope with an optional deadline.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::scope::error::ScopeError;
use crate::scope::release::ReleaseHandle;

/// Stand-in deadline for timeouts too large to add to `Instant::now()`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Lifetime of one request's processing.
///
/// Cloning is cheap; all clones observe the same deadline and cancellation.
/// A derived scope never outlives its parent: its effective deadline is the
/// earlier of the parent's and its own, and cancelling the parent cancels it.
#[derive(Debug, Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

#[derive(Debug)]
struct ScopeInner {
    parent: Option<Scope>,
    /// Effective deadline, already folded with the parent's.
    deadline: Option<Instant>,
    token: CancellationToken,
    /// Cause and the instant it took effect.
    cause: OnceLock<(ScopeError, Instant)>,
}

impl Scope {
    /// A root scope with no deadline that is never cancelled.
    pub fn background() -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                parent: None,
                deadline: None,
                token: CancellationToken::new(),
                cause: OnceLock::new(),
            }),
        }
    }

    /// Derive a child that only adds an explicit cancellation point.
    pub fn with_cancel(&self) -> (Scope, ReleaseHandle) {
        self.derive(None)
    }

    /// Derive a child whose deadline is `min(parent deadline, now + timeout)`.
    ///
    /// Timeouts past the representable range saturate to a far-future
    /// deadline, so the child always has one.
    pub fn with_timeout(&self, timeout: Duration) -> (Scope, ReleaseHandle) {
        let now = Instant::now();
        let deadline = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);
        self.derive(Some(deadline))
    }

    /// Derive a child whose deadline is `min(parent deadline, deadline)`.
    pub fn with_deadline(&self, deadline: Instant) -> (Scope, ReleaseHandle) {
        self.derive(Some(deadline))
    }

    fn derive(&self, requested: Option<Instant>) -> (Scope, ReleaseHandle) {
        let deadline = match (self.deadline(), requested) {
            (Some(parent), Some(own)) => Some(parent.min(own)),
            (parent, own) => parent.or(own),
        };

        let child = Scope {
            inner: Arc::new(ScopeInner {
                parent: Some(self.clone()),
                deadline,
                token: self.inner.token.child_token(),
                cause: OnceLock::new(),
            }),
        };
        let release = ReleaseHandle::new(child.clone());
        (child, release)
    }

    /// Effective deadline, if any ancestor or this scope set one.
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left until the effective deadline (zero once it has passed).
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// The scope this one was derived from.
    pub fn parent(&self) -> Option<&Scope> {
        self.inner.parent.as_ref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.err().is_some()
    }

    /// Cause of cancellation, or `None` while the scope is live.
    ///
    /// Whichever happened first wins: this scope's deadline elapsing, or an
    /// ancestor being cancelled. Once reported the cause never changes.
    pub fn err(&self) -> Option<ScopeError> {
        self.cause_at().map(|(cause, _)| cause)
    }

    fn cause_at(&self) -> Option<(ScopeError, Instant)> {
        if let Some(recorded) = self.inner.cause.get() {
            return Some(*recorded);
        }

        let inherited = self.inner.parent.as_ref().and_then(Scope::cause_at);
        let observed = match (inherited, self.inner.deadline) {
            (Some((_, at)), Some(deadline)) if deadline <= at => {
                (ScopeError::DeadlineExceeded, deadline)
            }
            (Some(inherited), _) => inherited,
            (None, Some(deadline)) if Instant::now() >= deadline => {
                (ScopeError::DeadlineExceeded, deadline)
            }
            (None, _) => return None,
        };

        Some(*self.inner.cause.get_or_init(|| observed))
    }

    /// Resolves once the scope is cancelled or its deadline elapses.
    pub async fn cancelled(&self) -> ScopeError {
        match self.inner.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.inner.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.inner.token.cancelled().await,
        }

        self.err().unwrap_or(ScopeError::DeadlineExceeded)
    }

    pub(crate) fn cancel(&self) {
        if self.cause_at().is_none() {
            let _ = self
                .inner
                .cause
                .set((ScopeError::Canceled, Instant::now()));
        }
        self.inner.token.cancel();
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::background()
    }
}
