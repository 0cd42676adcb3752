//! Bounded scope derivation for inbound requests.

use std::time::Duration;

use axum::http::{request::Parts, Request};

use crate::deadline::combinator::{select_timeout, TimeoutSelection, TimeoutSource};
use crate::deadline::parser::UserTimeout;
use crate::scope::{ReleaseHandle, Scope};

/// A request that carries an execution scope and a query string.
pub trait ScopedRequest {
    /// Scope attached by earlier pipeline stages, if any.
    fn scope(&self) -> Option<&Scope>;

    /// Raw query string, without the leading `?`.
    fn raw_query(&self) -> Option<&str>;
}

impl<B> ScopedRequest for Request<B> {
    fn scope(&self) -> Option<&Scope> {
        self.extensions().get::<Scope>()
    }

    fn raw_query(&self) -> Option<&str> {
        self.uri().query()
    }
}

impl ScopedRequest for Parts {
    fn scope(&self) -> Option<&Scope> {
        self.extensions.get::<Scope>()
    }

    fn raw_query(&self) -> Option<&str> {
        self.uri.query()
    }
}

/// Which source ended up governing the derived deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineOrigin {
    /// The user's `timeout` parameter.
    UserTimeout,
    /// The caller-supplied upper bound.
    UpperBound,
    /// The parent scope's deadline was already earlier.
    Inherited,
}

impl DeadlineOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserTimeout => "user_timeout",
            Self::UpperBound => "upper_bound",
            Self::Inherited => "inherited",
        }
    }
}

impl From<TimeoutSource> for DeadlineOrigin {
    fn from(source: TimeoutSource) -> Self {
        match source {
            TimeoutSource::UserTimeout => Self::UserTimeout,
            TimeoutSource::UpperBound => Self::UpperBound,
        }
    }
}

/// Result of one derivation.
#[derive(Debug)]
pub struct BoundedScope {
    pub scope: Scope,
    pub release: ReleaseHandle,
    pub user_timeout: UserTimeout,
    pub selection: TimeoutSelection,
    pub origin: DeadlineOrigin,
}

impl BoundedScope {
    pub fn into_parts(self) -> (Scope, ReleaseHandle) {
        (self.scope, self.release)
    }
}

/// Derive a scope bounded by the user timeout or, failing that, the upper
/// bound. The parent's deadline still applies when it is earlier.
pub fn derive_bounded_scope(
    parent: &Scope,
    query: Option<&str>,
    upper_bound: Duration,
) -> BoundedScope {
    let user_timeout = UserTimeout::from_query(query);
    let selection = select_timeout(upper_bound, &user_timeout);
    let (scope, release) = parent.with_timeout(selection.duration);

    let origin = match (parent.deadline(), scope.deadline()) {
        (Some(inherited), Some(effective)) if inherited == effective => DeadlineOrigin::Inherited,
        _ => selection.source.into(),
    };

    tracing::debug!(
        user_timeout = user_timeout.outcome(),
        source = selection.source.as_str(),
        origin = origin.as_str(),
        timeout = ?selection.duration,
        remaining = ?scope.remaining(),
        "Derived bounded request scope"
    );

    BoundedScope {
        scope,
        release,
        user_timeout,
        selection,
        origin,
    }
}

/// Scope for handling `req`, bounded even when no timeout stage ran yet.
///
/// Never fails: a missing, malformed or non-positive `timeout` falls back to
/// `upper_bound`, while a valid one is honored even past `upper_bound`. A
/// request without a scope is treated as having a background parent.
pub fn request_scope_with_upper_bound<R>(req: &R, upper_bound: Duration) -> (Scope, ReleaseHandle)
where
    R: ScopedRequest + ?Sized,
{
    let parent = req.scope().cloned().unwrap_or_default();
    derive_bounded_scope(&parent, req.raw_query(), upper_bound).into_parts()
}
