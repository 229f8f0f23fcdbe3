#![cfg(feature = "tokio")]

mod common;

use std::sync::Arc;

use common::{AppError, FakeSession};
use txscope_core::{ScopeRole, TaskContext, TxContext, TxError, TxManager};

fn task_manager(session: &Arc<FakeSession>) -> Arc<TxManager> {
    Arc::new(TxManager::new(session.settings().context(TaskContext)))
}

#[tokio::test]
async fn scopes_outside_a_task_context_are_refused() {
    let session = FakeSession::new();
    let manager = task_manager(&session);

    let err = TxContext::new().manager(&manager).enter().unwrap_err();
    assert!(matches!(err, TxError::ContextUnavailable(_)));
    assert!(session.events().is_empty());
}

#[tokio::test]
async fn tasks_sharing_a_session_get_separate_stacks() {
    let session = FakeSession::new();
    let manager = task_manager(&session);

    let outer = {
        let manager = manager.clone();
        TaskContext::scope(async move {
            let scope = TxContext::new().manager(&manager).enter().unwrap();
            let depth_before = scope.depth().unwrap();

            let other = {
                let manager = manager.clone();
                tokio::spawn(TaskContext::scope(async move {
                    manager.depth(manager.session().identity()).unwrap()
                }))
                .await
                .unwrap()
            };

            let depth_after = scope.depth().unwrap();
            scope.exit(Ok::<_, AppError>(())).unwrap();
            (depth_before, other, depth_after)
        })
        .await
    };

    assert_eq!(outer, (1, 0, 1));
}

#[test]
fn sync_scope_supports_nesting() {
    let session = FakeSession::new();
    let manager = task_manager(&session);

    TaskContext::sync_scope(|| {
        TxContext::new()
            .manager(&manager)
            .run(|_| {
                let inner = TxContext::new()
                    .manager(&manager)
                    .run(|_| Ok::<_, AppError>(()))?;
                assert_eq!(inner.role(), ScopeRole::Joined);
                Ok::<_, AppError>(())
            })
            .unwrap();
    });

    assert_eq!(session.events(), ["begin", "commit"]);
}
