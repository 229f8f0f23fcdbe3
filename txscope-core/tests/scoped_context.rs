mod common;

use std::sync::Arc;

use common::{AppError, FakeSession};
use txscope_core::{
    ErrorPolicy, ExistingTxnPolicy, PolicyOverride, ScopeRole, ScopeStatus, SessionHandle,
    TransactionOrigin, Transactional, TxContext, TxError, TxManager,
};

#[test]
fn guard_exit_commits() {
    let session = FakeSession::new();
    let manager = session.manager();

    let scope = TxContext::new().manager(&manager).enter().unwrap();
    assert_eq!(scope.depth().unwrap(), 1);
    assert_eq!(scope.identity(), session.identity());
    let done = scope.exit(Ok::<_, AppError>("ok")).unwrap();

    assert!(done.is_committed());
    assert_eq!(session.events(), ["begin", "commit"]);
}

#[test]
fn dropping_a_guard_without_exit_rolls_back() {
    let session = FakeSession::new();
    let manager = session.manager();

    {
        let _scope = TxContext::new().manager(&manager).enter().unwrap();
    }

    assert_eq!(session.events(), ["begin", "rollback"]);
    assert_eq!(manager.depth(session.identity()).unwrap(), 0);
}

#[test]
fn panic_inside_a_block_rolls_back() {
    let session = FakeSession::new();
    let manager = session.manager();

    let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _ = TxContext::new()
            .manager(&manager)
            .run(|_| -> Result<(), AppError> { panic!("boom") });
    }));

    assert!(caught.is_err());
    assert_eq!(session.events(), ["begin", "rollback"]);
}

#[test]
fn exiting_out_of_order_is_a_scope_order_violation() {
    let session = FakeSession::new();
    let manager = session.manager();

    let outer = TxContext::new().manager(&manager).enter().unwrap();
    let inner = TxContext::new().manager(&manager).enter().unwrap();
    assert_eq!(inner.depth().unwrap(), 2);

    let err = outer.exit(Ok::<_, AppError>(())).unwrap_err();
    assert!(matches!(err.tx(), Some(TxError::ScopeOrderViolation { .. })));
    assert!(err.tx().is_some_and(TxError::is_programming_error));

    // the inner scope is still the top and can close normally; the outer
    // one then rolls back on its own
    let done = inner.exit(Ok::<_, AppError>(())).unwrap();
    assert_eq!(done.role(), ScopeRole::Joined);
    assert_eq!(manager.depth(session.identity()).unwrap(), 0);
    assert_eq!(session.events(), ["begin", "rollback"]);

    let later = TxContext::new()
        .manager(&manager)
        .run(|_| Ok::<_, AppError>(()))
        .unwrap();
    assert_eq!(later.role(), ScopeRole::Root);
    assert!(later.is_committed());
    assert_eq!(session.events(), ["begin", "rollback", "begin", "commit"]);
}

#[test]
fn dropping_guards_out_of_order_still_rolls_back_once() {
    let session = FakeSession::new();
    let manager = session.manager();

    let outer = TxContext::new().manager(&manager).enter().unwrap();
    let inner = TxContext::new().manager(&manager).enter().unwrap();
    drop(outer);
    assert_eq!(manager.depth(session.identity()).unwrap(), 2);
    assert_eq!(session.events(), ["begin"]);
    drop(inner);

    assert_eq!(manager.depth(session.identity()).unwrap(), 0);
    assert_eq!(session.events(), ["begin", "rollback"]);
    assert!(!session.is_active());
}

#[test]
fn opening_after_a_manual_commit_is_an_unexpected_session_state() {
    let session = FakeSession::new();
    let manager = session.manager();

    let err = TxContext::new()
        .manager(&manager)
        .run(|scope| {
            scope.session().commit().map_err(TxError::from)?;
            let inner = TxContext::new().manager(&manager).enter();
            assert!(matches!(inner, Err(TxError::UnexpectedSessionState { .. })));
            Ok::<_, AppError>(())
        })
        .unwrap_err();

    assert!(matches!(err.tx(), Some(TxError::UnexpectedSessionState { .. })));
    assert_eq!(manager.depth(session.identity()).unwrap(), 0);
    assert_eq!(session.events(), ["begin", "commit"]);
}

#[test]
fn programming_errors_ignore_the_status_policy() {
    let session = FakeSession::new();
    let manager = session.manager();

    let err = TxContext::new()
        .manager(&manager)
        .error_policy(ErrorPolicy::Status)
        .run(|scope| {
            scope.session().commit().map_err(TxError::from)?;
            Ok::<_, AppError>(())
        })
        .unwrap_err();

    assert!(matches!(err.tx(), Some(TxError::UnexpectedSessionState { .. })));
    assert_eq!(manager.depth(session.identity()).unwrap(), 0);
}

#[test]
fn context_inherits_the_enclosing_decorator_policy() {
    let session = FakeSession::new();
    let manager = session.manager();

    let outer = Transactional::new()
        .manager(&manager)
        .error_policy(ErrorPolicy::Status)
        .run(|| {
            let inner = TxContext::new()
                .manager(&manager)
                .run(|scope| {
                    assert_eq!(scope.policy().error_policy, ErrorPolicy::Status);
                    Err::<(), _>(AppError::business("inner"))
                })?;
            assert_eq!(inner.status(), ScopeStatus::RolledBack);
            Ok::<_, AppError>(())
        })
        .unwrap();

    assert_eq!(outer.status(), ScopeStatus::RolledBack);
}

#[test]
fn decorator_never_inherits_from_the_enclosing_scope() {
    let session = FakeSession::new();
    let manager = session.manager();

    let outer = Transactional::new()
        .manager(&manager)
        .error_policy(ErrorPolicy::Status)
        .run(|| {
            let inner = Transactional::new()
                .manager(&manager)
                .run(|| Err::<(), _>(AppError::business("inner")));
            assert!(inner.is_err());
            Ok::<_, AppError>(())
        })
        .unwrap();

    assert!(!outer.is_committed());
}

#[test]
fn instance_config_beats_the_process_wide_tier() {
    let session = FakeSession::new();
    let manager = Arc::new(TxManager::new(
        session.settings().error_policy(ErrorPolicy::Status),
    ));

    let swallowed = TxContext::new()
        .manager(&manager)
        .run(|_| Err::<(), _>(AppError::business("one")));
    assert!(swallowed.is_ok());

    let raised = TxContext::new()
        .manager(&manager)
        .config(PolicyOverride::NONE.error_policy(ErrorPolicy::Raise))
        .run(|_| Err::<(), _>(AppError::business("two")));
    assert!(raised.is_err());
}

#[test]
fn process_wide_existing_txn_policy_applies_to_every_facade() {
    let session = FakeSession::with_ambient(TransactionOrigin::Autobegin);
    let manager = Arc::new(TxManager::new(
        session
            .settings()
            .existing_txn_policy(ExistingTxnPolicy::AdoptAutobegin),
    ));

    let done = TxContext::new()
        .manager(&manager)
        .run(|_| Ok::<_, AppError>(()))
        .unwrap();

    assert!(done.scope().adopted_ambient());
    assert_eq!(session.events(), ["commit"]);
}
