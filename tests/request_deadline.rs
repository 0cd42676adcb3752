//! Deadline resolution for requests whose timeout stage has not run yet.

use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use scoped_deadline::deadline::{derive_bounded_scope, DeadlineOrigin};
use scoped_deadline::{request_scope_with_upper_bound, ReleaseHandle, Scope, ScopeError};

fn new_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

struct Case {
    name: &'static str,
    uri: &'static str,
    parent: fn(&Scope) -> (Scope, ReleaseHandle),
    upper_bound: Duration,
    /// Remaining time must be strictly greater than this.
    min_remaining: Duration,
    /// ...and no greater than this.
    max_remaining: Duration,
}

#[test]
fn test_request_scope_with_upper_bound() {
    let cases = [
        Case {
            name: "request scope has a bound deadline",
            uri: "/foo",
            parent: |root| root.with_timeout(Duration::from_secs(60)),
            upper_bound: Duration::from_secs(30),
            min_remaining: Duration::from_secs(28),
            max_remaining: Duration::from_secs(32),
        },
        Case {
            name: "no bound deadline, no user timeout",
            uri: "/foo",
            parent: |root| root.with_cancel(),
            upper_bound: Duration::from_secs(30),
            min_remaining: Duration::from_secs(28),
            max_remaining: Duration::from_secs(30),
        },
        Case {
            name: "no bound deadline, user timeout is malformed",
            uri: "/foo?timeout=invalid",
            parent: |root| root.with_cancel(),
            upper_bound: Duration::from_secs(30),
            min_remaining: Duration::from_secs(28),
            max_remaining: Duration::from_secs(30),
        },
        Case {
            name: "no bound deadline, user timeout is zero",
            uri: "/foo?timeout=0s",
            parent: |root| root.with_cancel(),
            upper_bound: Duration::from_secs(30),
            min_remaining: Duration::from_secs(28),
            max_remaining: Duration::from_secs(30),
        },
        Case {
            name: "no bound deadline, user timeout is valid",
            uri: "/foo?timeout=5m2s",
            parent: |root| root.with_cancel(),
            upper_bound: Duration::from_secs(60),
            min_remaining: Duration::from_secs(300),
            max_remaining: Duration::from_secs(302),
        },
    ];

    for case in cases {
        let root = Scope::background();
        let (parent, _parent_release) = (case.parent)(&root);

        let mut req = new_request(case.uri);
        req.extensions_mut().insert(parent);

        let (scope, _release) = request_scope_with_upper_bound(&req, case.upper_bound);

        let remaining = scope
            .remaining()
            .unwrap_or_else(|| panic!("{}: expected the scope to have a deadline", case.name));
        assert!(
            remaining > case.min_remaining && remaining <= case.max_remaining,
            "{}: remaining {:?} not in ({:?}, {:?}]",
            case.name,
            remaining,
            case.min_remaining,
            case.max_remaining
        );
        assert!(!scope.is_cancelled(), "{}", case.name);
    }
}

#[test]
fn test_earlier_parent_deadline_is_kept_verbatim() {
    let (parent, _p) = Scope::background().with_timeout(Duration::from_secs(10));
    let mut req = new_request("/foo?timeout=invalid");
    req.extensions_mut().insert(parent.clone());

    let (scope, _release) = request_scope_with_upper_bound(&req, Duration::from_secs(30));
    assert_eq!(scope.deadline(), parent.deadline());
}

#[test]
fn test_user_timeout_cannot_extend_parent_deadline() {
    let (parent, _p) = Scope::background().with_timeout(Duration::from_secs(10));
    let bounded = derive_bounded_scope(&parent, Some("timeout=5m2s"), Duration::from_secs(60));

    assert_eq!(bounded.origin, DeadlineOrigin::Inherited);
    assert_eq!(bounded.selection.duration, Duration::from_secs(302));
    assert_eq!(bounded.scope.deadline(), parent.deadline());
}

#[test]
fn test_user_timeout_shorter_than_upper_bound() {
    let req = new_request("/foo?watch=true&timeout=1.5s");
    let (scope, _release) = request_scope_with_upper_bound(&req, Duration::from_secs(30));
    let remaining = scope.remaining().unwrap();
    assert!(remaining > Duration::from_secs(1) && remaining <= Duration::from_millis(1_500));
}

#[test]
fn test_negative_user_timeout_falls_back() {
    let req = new_request("/foo?timeout=-10s");
    let (scope, _release) = request_scope_with_upper_bound(&req, Duration::from_secs(30));
    assert!(scope.remaining().unwrap() > Duration::from_secs(28));
}

#[test]
fn test_huge_upper_bound_still_yields_deadline() {
    let req = new_request("/foo");
    let (scope, _release) = request_scope_with_upper_bound(&req, Duration::MAX);
    assert!(scope.deadline().is_some());
    assert!(!scope.is_cancelled());
}

#[test]
fn test_release_is_idempotent_and_parent_unaffected() {
    let (parent, _p) = Scope::background().with_cancel();
    let mut req = new_request("/foo");
    req.extensions_mut().insert(parent.clone());

    let (scope, release) = request_scope_with_upper_bound(&req, Duration::from_secs(30));
    let deadline = scope.deadline();

    release.release();
    release.release();
    drop(release);

    assert_eq!(scope.err(), Some(ScopeError::Canceled));
    assert_eq!(scope.deadline(), deadline);
    assert!(!parent.is_cancelled());
}

#[test]
fn test_cancelled_parent_cancels_derived_scope() {
    let (parent, parent_release) = Scope::background().with_cancel();
    let mut req = new_request("/foo?timeout=5m");
    req.extensions_mut().insert(parent);

    let (scope, _release) = request_scope_with_upper_bound(&req, Duration::from_secs(30));
    assert!(!scope.is_cancelled());

    parent_release.release();
    assert_eq!(scope.err(), Some(ScopeError::Canceled));
}

#[tokio::test]
async fn test_derived_scope_expires_at_user_deadline() {
    let req = new_request("/foo?timeout=50ms");
    let (scope, _release) = request_scope_with_upper_bound(&req, Duration::from_secs(30));

    let cause = tokio::time::timeout(Duration::from_secs(2), scope.cancelled())
        .await
        .expect("scope should expire well before the upper bound");
    assert_eq!(cause, ScopeError::DeadlineExceeded);
}

#[test]
fn test_expired_request_scope_reports_deadline_after_parent_release() {
    let (parent, parent_release) = Scope::background().with_cancel();
    let mut req = new_request("/foo?timeout=10ms");
    req.extensions_mut().insert(parent);

    let (scope, _release) = request_scope_with_upper_bound(&req, Duration::from_secs(30));
    std::thread::sleep(Duration::from_millis(30));
    parent_release.release();

    assert_eq!(scope.err(), Some(ScopeError::DeadlineExceeded));
}
