mod common;

use common::{AppError, FakeSession};
use txscope_core::{
    ErrorPolicy, FailureKind, ScopeRole, ScopeStatus, SessionHandle, Transactional, TxContext,
    TxError,
};

#[test]
fn root_scope_commits_on_success() {
    let session = FakeSession::new();
    let manager = session.manager();

    let done = Transactional::new()
        .manager(&manager)
        .run(|| Ok::<_, AppError>(42))
        .unwrap();

    assert_eq!(done.value(), Some(&42));
    assert!(done.is_committed());
    assert_eq!(done.role(), ScopeRole::Root);
    assert_eq!(session.events(), ["begin", "commit"]);
    assert!(!session.is_active());
    assert_eq!(manager.depth(session.identity()).unwrap(), 0);
}

#[test]
fn root_scope_rolls_back_and_raises_on_failure() {
    let session = FakeSession::new();
    let manager = session.manager();

    let err = Transactional::new()
        .manager(&manager)
        .run(|| Err::<(), _>(AppError::business("nope")))
        .unwrap_err();

    assert!(matches!(err, AppError::Business(ref m) if m == "nope"));
    assert_eq!(session.events(), ["begin", "rollback"]);
}

#[test]
fn status_policy_swallows_the_failure() {
    let session = FakeSession::new();
    let manager = session.manager();

    let done = Transactional::new()
        .manager(&manager)
        .error_policy(ErrorPolicy::Status)
        .run(|| Err::<(), _>(AppError::business("nope")))
        .unwrap();

    assert_eq!(done.status(), ScopeStatus::RolledBack);
    assert!(done.value().is_none());
    assert!(matches!(done.error(), Some(AppError::Business(_))));
    assert_eq!(done.captured().map(|c| c.kind), Some(FailureKind::Caller));
    assert!(done.into_result().is_err());
    assert_eq!(session.events(), ["begin", "rollback"]);
}

#[test]
fn inner_scopes_join_and_only_the_root_commits() {
    let session = FakeSession::new();
    let manager = session.manager();

    let done = Transactional::new()
        .manager(&manager)
        .run(|| {
            let inner = Transactional::new().manager(&manager).run(|| {
                let innermost = TxContext::new().manager(&manager).run(|_| Ok::<_, AppError>(1))?;
                assert_eq!(innermost.role(), ScopeRole::Joined);
                Ok::<_, AppError>(innermost.into_value().unwrap_or_default() + 1)
            })?;
            assert_eq!(inner.role(), ScopeRole::Joined);
            assert_eq!(inner.status(), ScopeStatus::Committed);
            Ok::<_, AppError>(inner.into_value().unwrap_or_default() + 1)
        })
        .unwrap();

    assert_eq!(done.value(), Some(&3));
    assert_eq!(session.events(), ["begin", "commit"]);
}

#[test]
fn caught_inner_failure_still_rolls_back_the_root() {
    let session = FakeSession::new();
    let manager = session.manager();

    let err = Transactional::new()
        .manager(&manager)
        .run(|| {
            let inner = Transactional::new()
                .manager(&manager)
                .run(|| Err::<(), _>(AppError::business("inner")));
            assert!(inner.is_err());
            Ok::<_, AppError>("outer finished")
        })
        .unwrap_err();

    assert!(matches!(err.tx(), Some(TxError::RollbackOnly { .. })));
    assert_eq!(session.events(), ["begin", "rollback"]);
}

#[test]
fn status_inner_failure_taints_the_root_too() {
    let session = FakeSession::new();
    let manager = session.manager();

    let done = Transactional::new()
        .manager(&manager)
        .error_policy(ErrorPolicy::Status)
        .run(|| {
            let inner = Transactional::new()
                .manager(&manager)
                .error_policy(ErrorPolicy::Status)
                .run(|| Err::<(), _>(AppError::business("inner")))?;
            assert_eq!(inner.role(), ScopeRole::Joined);
            assert_eq!(inner.status(), ScopeStatus::RolledBack);
            Ok::<_, AppError>(())
        })
        .unwrap();

    assert_eq!(done.status(), ScopeStatus::RolledBack);
    assert_eq!(done.captured().map(|c| c.kind), Some(FailureKind::RollbackOnly));
    assert!(matches!(done.error().and_then(AppError::tx), Some(TxError::RollbackOnly { .. })));
    assert_eq!(session.events(), ["begin", "rollback"]);
}

#[test]
fn nested_scope_failure_only_undoes_its_savepoint() {
    let session = FakeSession::new();
    let manager = session.manager();

    let done = Transactional::new()
        .manager(&manager)
        .run(|| {
            let inner = Transactional::new()
                .manager(&manager)
                .nested(true)
                .run(|| Err::<(), _>(AppError::business("inner")));
            assert!(inner.is_err());
            Ok::<_, AppError>(())
        })
        .unwrap();

    assert!(done.is_committed());
    assert_eq!(
        session.events(),
        ["begin", "savepoint sp1", "rollback_to sp1", "commit"]
    );
}

#[test]
fn nested_scope_success_releases_its_savepoint() {
    let session = FakeSession::new();
    let manager = session.manager();

    Transactional::new()
        .manager(&manager)
        .run(|| {
            TxContext::new()
                .manager(&manager)
                .nested(true)
                .run(|_| Ok::<_, AppError>(()))
                .map(|_| ())
        })
        .unwrap();

    assert_eq!(
        session.events(),
        ["begin", "savepoint sp1", "release sp1", "commit"]
    );
}

#[test]
fn nested_flag_on_the_outermost_scope_begins_normally() {
    let session = FakeSession::new();
    let manager = session.manager();

    let done = Transactional::new()
        .manager(&manager)
        .nested(true)
        .run(|| Ok::<_, AppError>(()))
        .unwrap();

    assert_eq!(done.role(), ScopeRole::Root);
    assert_eq!(session.events(), ["begin", "commit"]);
}

#[test]
fn sequential_roots_each_get_their_own_transaction() {
    let session = FakeSession::new();
    let manager = session.manager();
    let create = Transactional::new()
        .manager(&manager)
        .wrap(|n: i32| Ok::<_, AppError>(n * 2));

    assert_eq!(create(1).unwrap().into_value(), Some(2));
    assert_eq!(create(2).unwrap().into_value(), Some(4));
    assert_eq!(session.events(), ["begin", "commit", "begin", "commit"]);
}

#[test]
fn sessions_have_independent_stacks() {
    let a = FakeSession::new();
    let b = FakeSession::new();
    let manager_a = a.manager();
    let manager_b = b.manager();

    Transactional::new()
        .manager(&manager_a)
        .run(|| {
            let inner = Transactional::new()
                .manager(&manager_b)
                .run(|| Ok::<_, AppError>(()))?;
            assert_eq!(inner.role(), ScopeRole::Root);
            Ok::<_, AppError>(())
        })
        .unwrap();

    assert_eq!(a.events(), ["begin", "commit"]);
    assert_eq!(b.events(), ["begin", "commit"]);
}
