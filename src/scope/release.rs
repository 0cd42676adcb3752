//! Release handle returned alongside every derived scope.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::scope::handle::Scope;

/// Releases a derived scope.
///
/// Releasing cancels the scope and everything derived from it. It is
/// idempotent, and dropping the handle releases as well, so holding it for
/// the duration of the work guarantees release on every exit path.
#[derive(Debug)]
#[must_use = "dropping a ReleaseHandle releases its scope immediately"]
pub struct ReleaseHandle {
    scope: Scope,
    released: AtomicBool,
}

impl ReleaseHandle {
    pub(crate) fn new(scope: Scope) -> Self {
        Self {
            scope,
            released: AtomicBool::new(false),
        }
    }

    /// Cancel the scope. Calls after the first have no effect.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        self.scope.cancel();
        tracing::trace!(cause = ?self.scope.err(), "Scope released");
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// The scope this handle releases.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

impl Drop for ReleaseHandle {
    fn drop(&mut self) {
        self.release();
    }
}
