//! The transaction-scope state machine.
//!
//! `open` decides between beginning a root transaction, reconciling an
//! ambient one, or joining the scope on top of the stack. `close` decides
//! who commits or rolls back: only a root scope (or a savepoint scope) ever
//! touches the session's transaction; a plain joined scope only records its
//! outcome and, on failure, taints its parent.

use crate::context::with_stacks;
use crate::error::TxError;
use crate::manager::TxManager;
use crate::policy::{EffectivePolicy, ExistingTxnPolicy, PolicyOverride};
use crate::session::{SessionHandle, SessionId, TransactionOrigin};
use crate::stack::{
    CapturedError, FailureKind, ScopeHandle, ScopeRole, ScopeSettings, ScopeStack, ScopeStatus,
    TransactionScope,
};

/// How the code inside a scope finished.
#[derive(Debug, Clone)]
pub enum CloseOutcome {
    Success,
    Failure(CapturedError),
}

/// Parameters for [`TxManager::open`] beyond the resolved policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenOptions {
    /// Open a savepoint instead of a plain join when a scope is already open.
    pub nested: bool,
    /// Call-site overrides recorded on the scope for inheritance.
    pub call_site: PolicyOverride,
}

impl TxManager {
    /// Call-site overrides of the innermost scope open on `identity`, if any.
    pub fn inherited_call_site(&self, identity: SessionId) -> Result<PolicyOverride, TxError> {
        with_stacks(self.context(), |stacks| {
            stacks
                .top(identity)
                .map(TransactionScope::call_site)
                .unwrap_or_default()
        })
    }

    /// Number of scopes currently open on `identity` in this context.
    pub fn depth(&self, identity: SessionId) -> Result<usize, TxError> {
        with_stacks(self.context(), |stacks| stacks.depth(identity))
    }

    /// Open a scope on `session`.
    ///
    /// Nothing is pushed when this fails.
    pub fn open(
        &self,
        session: &dyn SessionHandle,
        policy: EffectivePolicy,
        options: OpenOptions,
    ) -> Result<ScopeHandle, TxError> {
        let identity = session.identity();
        let settings = ScopeSettings {
            policy,
            call_site: options.call_site,
            adopted_ambient: false,
        };

        with_stacks(self.context(), |stacks| {
            let stack = stacks.stack_mut(identity);
            let depth = stack.len();

            if depth > 0 {
                if !session.is_transaction_active() {
                    return Err(TxError::UnexpectedSessionState {
                        session: identity,
                        detail: format!(
                            "{depth} scope(s) open but the session has no active transaction"
                        ),
                    });
                }
                let savepoint = if options.nested {
                    Some(session.begin_nested()?)
                } else {
                    None
                };
                tracing::debug!(
                    session = %identity,
                    depth,
                    savepoint = savepoint.as_ref().map(|t| t.name()),
                    "joining open transaction"
                );
                return Ok(stack.push(ScopeRole::Joined, savepoint, settings));
            }

            if !session.is_transaction_active() {
                session.begin()?;
                tracing::debug!(session = %identity, policy = %settings.policy.error_policy, "began root transaction");
                return Ok(stack.push(ScopeRole::Root, None, settings));
            }

            let adopted = ScopeSettings {
                adopted_ambient: true,
                ..settings
            };
            let existing = policy.existing_txn_policy;
            match existing {
                ExistingTxnPolicy::Error => Err(TxError::AmbientTransactionConflict {
                    session: identity,
                    reason: "existing_txn_policy is `error`".into(),
                }),
                ExistingTxnPolicy::Join => {
                    tracing::debug!(session = %identity, policy = %existing, "adopting ambient transaction");
                    Ok(stack.push(ScopeRole::Root, None, adopted))
                }
                ExistingTxnPolicy::AdoptAutobegin => match session.transaction_origin() {
                    Some(TransactionOrigin::Explicit) => {
                        Err(TxError::AmbientTransactionConflict {
                            session: identity,
                            reason: "the ambient transaction was begun explicitly, not by autobegin"
                                .into(),
                        })
                    }
                    Some(TransactionOrigin::Autobegin) | None => {
                        tracing::debug!(session = %identity, policy = %existing, "adopting autobegun transaction");
                        Ok(stack.push(ScopeRole::Root, None, adopted))
                    }
                },
                ExistingTxnPolicy::Savepoint => {
                    let token = session.begin_nested()?;
                    tracing::debug!(session = %identity, savepoint = token.name(), "savepoint inside ambient transaction");
                    Ok(stack.push(ScopeRole::Joined, Some(token), settings))
                }
                ExistingTxnPolicy::Reset => {
                    session.rollback()?;
                    session.begin()?;
                    tracing::debug!(session = %identity, "reset ambient transaction");
                    Ok(stack.push(ScopeRole::Root, None, settings))
                }
            }
        })?
    }

    /// Close the scope behind `handle` and pop it.
    ///
    /// Session failures during commit/rollback are recorded on the returned
    /// scope, not returned as `Err`; `Err` is reserved for programming errors
    /// (out-of-order close, diverged session state).
    ///
    /// A scope closed while scopes above it are still open is left on the
    /// stack marked abandoned, and the call fails with `ScopeOrderViolation`.
    /// It is closed as a failure as soon as the scopes above it are gone.
    pub fn close(
        &self,
        session: &dyn SessionHandle,
        handle: ScopeHandle,
        outcome: CloseOutcome,
    ) -> Result<TransactionScope, TxError> {
        let identity = handle.identity();

        with_stacks(self.context(), |stacks| {
            let stack = stacks.stack_mut(identity);
            let mut scope = match stack.pop(&handle) {
                Ok(scope) => scope,
                Err(violation) => {
                    if stack.abandon(&handle) {
                        tracing::error!(
                            session = %identity,
                            scope = handle.id(),
                            depth = stack.len(),
                            "scope closed out of order; it rolls back once the scopes above it close"
                        );
                    }
                    return Err(violation);
                }
            };

            let result = settle(session, stack, &mut scope, outcome);
            drain_abandoned(session, stack);
            result.map(|()| scope)
        })?
    }
}

/// Close every abandoned scope that is now on top of the stack.
fn drain_abandoned(session: &dyn SessionHandle, stack: &mut ScopeStack) {
    while let Some(mut scope) = stack.pop_abandoned() {
        let outcome = CloseOutcome::Failure(CapturedError::new(
            FailureKind::Caller,
            "scope closed out of order",
        ));
        match settle(session, stack, &mut scope, outcome) {
            Ok(()) => tracing::debug!(
                session = %scope.identity(),
                scope = scope.id(),
                status = ?scope.status(),
                "closed out-of-order scope"
            ),
            Err(err) => tracing::error!(
                session = %scope.identity(),
                scope = scope.id(),
                error = %err,
                "failed to close out-of-order scope"
            ),
        }
    }
}

/// Commit, roll back or release for an already popped `scope`.
fn settle(
    session: &dyn SessionHandle,
    stack: &mut ScopeStack,
    scope: &mut TransactionScope,
    outcome: CloseOutcome,
) -> Result<(), TxError> {
    let identity = scope.identity();
    let depth = stack.len();

    if !session.is_transaction_active() {
        scope.finish(
            ScopeStatus::Failed,
            Some(CapturedError::new(
                FailureKind::Database,
                "session has no active transaction",
            )),
        );
        if let Some(parent) = stack.top_mut() {
            parent.taint();
        }
        return Err(TxError::UnexpectedSessionState {
            session: identity,
            detail: format!(
                "scope {} closing but the session has no active transaction; \
                 was commit/rollback called on the session directly?",
                scope.id()
            ),
        });
    }

    let failure = match outcome {
        CloseOutcome::Failure(err) => Some(err),
        CloseOutcome::Success if scope.is_tainted() => Some(CapturedError::new(
            FailureKind::RollbackOnly,
            TxError::RollbackOnly { session: identity }.to_string(),
        )),
        CloseOutcome::Success => None,
    };

    match (scope.role(), scope.savepoint().cloned()) {
        (ScopeRole::Joined, Some(token)) => {
            let (status, error) = match failure {
                Some(err) => match session.rollback_to_savepoint(&token) {
                    Ok(()) => {
                        tracing::debug!(session = %identity, depth, savepoint = token.name(), "rolled back to savepoint");
                        (ScopeStatus::RolledBack, Some(err))
                    }
                    Err(db) => {
                        tracing::error!(session = %identity, savepoint = token.name(), error = %db, "rollback to savepoint failed");
                        if let Some(parent) = stack.top_mut() {
                            parent.taint();
                        }
                        (ScopeStatus::Failed, Some(err))
                    }
                },
                None => match session.release_savepoint(&token) {
                    Ok(()) => {
                        tracing::debug!(session = %identity, depth, savepoint = token.name(), "released savepoint");
                        (ScopeStatus::Committed, None)
                    }
                    Err(db) => {
                        tracing::error!(session = %identity, savepoint = token.name(), error = %db, "release savepoint failed");
                        let status = match session.rollback_to_savepoint(&token) {
                            Ok(()) => ScopeStatus::RolledBack,
                            Err(_) => {
                                if let Some(parent) = stack.top_mut() {
                                    parent.taint();
                                }
                                ScopeStatus::Failed
                            }
                        };
                        (status, Some(CapturedError::database(db)))
                    }
                },
            };
            scope.finish(status, error);
        }
        (ScopeRole::Joined, None) => match failure {
            Some(err) => {
                if let Some(parent) = stack.top_mut() {
                    parent.taint();
                }
                tracing::debug!(session = %identity, depth, "joined scope failed; parent marked rollback-only");
                scope.finish(ScopeStatus::RolledBack, Some(err));
            }
            None => scope.finish(ScopeStatus::Committed, None),
        },
        (ScopeRole::Root, _) => {
            let (status, error) = match failure {
                Some(err) => {
                    if err.kind == FailureKind::RollbackOnly {
                        tracing::warn!(session = %identity, "rolling back: an inner scope failed");
                    } else {
                        tracing::warn!(session = %identity, kind = ?err.kind, error = %err.message, "rolling back root transaction");
                    }
                    match session.rollback() {
                        Ok(()) => {
                            tracing::debug!(session = %identity, "rolled back root transaction");
                            (ScopeStatus::RolledBack, Some(err))
                        }
                        Err(db) => {
                            tracing::error!(session = %identity, error = %db, "rollback failed");
                            (ScopeStatus::Failed, Some(err))
                        }
                    }
                }
                None => match session.commit() {
                    Ok(()) => {
                        tracing::debug!(session = %identity, "committed root transaction");
                        (ScopeStatus::Committed, None)
                    }
                    Err(db) => {
                        tracing::error!(session = %identity, error = %db, "commit failed; rolling back");
                        let status = match session.rollback() {
                            Ok(()) => ScopeStatus::RolledBack,
                            Err(rb) => {
                                tracing::error!(session = %identity, error = %rb, "rollback after failed commit failed");
                                ScopeStatus::Failed
                            }
                        };
                        (status, Some(CapturedError::database(db)))
                    }
                },
            };
            scope.finish(status, error);
        }
    }

    Ok(())
}
