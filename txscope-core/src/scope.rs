//! Scoped-context façade and the open/close plumbing shared with the
//! decorator.
//!
//! [`TxContext`] wraps an explicit block:
//!
//! ```ignore
//! let done = TxContext::new().run(|scope| {
//!     let users = Crud::<User>::bind(scope, &session)?;
//!     users.add(User::new("a@example.com"))?;
//!     Ok::<_, DataError>(())
//! })?;
//! assert!(done.is_committed());
//! ```
//!
//! or, when the block does not fit in a closure, an explicit guard:
//!
//! ```ignore
//! let scope = TxContext::new().enter()?;
//! let result = work(&scope);
//! let done = scope.exit(result)?;
//! ```

use std::sync::Arc;

use crate::completion::{Completion, Outcome};
use crate::engine::{CloseOutcome, OpenOptions};
use crate::error::{DatabaseError, TxError};
use crate::manager::{global_manager, TxManager};
use crate::policy::{EffectivePolicy, ErrorPolicy, ExistingTxnPolicy, PolicyOverride};
use crate::session::{SessionId, SharedSession};
use crate::stack::{CapturedError, FailureKind, ScopeHandle, TransactionScope};

/// Where a façade takes its call-site tier from.
#[derive(Debug, Clone, Copy)]
pub(crate) enum CallSite {
    /// The façade's own parameters (decorator).
    Own(PolicyOverride),
    /// Whatever the innermost open scope was opened with (scoped context).
    Inherited,
}

/// Everything needed to open one scope.
pub(crate) struct ScopeRequest {
    pub manager: Option<Arc<TxManager>>,
    pub call_site: CallSite,
    pub instance: PolicyOverride,
    pub nested: bool,
}

impl ScopeRequest {
    /// Resolve the effective policy and open the scope.
    pub(crate) fn open(self) -> Result<ActiveScope, TxError> {
        let manager = match self.manager {
            Some(manager) => manager,
            None => global_manager()?,
        };
        let session = manager.session();
        let identity = session.identity();

        let call_site = match self.call_site {
            CallSite::Own(overrides) => overrides,
            CallSite::Inherited => manager.inherited_call_site(identity)?,
        };
        let policy = EffectivePolicy::resolve(
            &call_site,
            &self.instance,
            &manager.global_policy(),
            EffectivePolicy::BUILTIN,
        );

        let handle = manager.open(
            session.as_ref(),
            policy,
            OpenOptions {
                nested: self.nested,
                call_site,
            },
        )?;

        Ok(ActiveScope {
            manager,
            session,
            policy,
            handle: Some(handle),
        })
    }
}

/// An open transaction scope.
///
/// Close it with [`ActiveScope::exit`]. Dropping it without exiting (for
/// instance while unwinding from a panic) closes it as a failure.
pub struct ActiveScope {
    manager: Arc<TxManager>,
    session: SharedSession,
    policy: EffectivePolicy,
    handle: Option<ScopeHandle>,
}

impl ActiveScope {
    /// The session this scope (and every scope joined to it) runs on.
    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    pub fn identity(&self) -> SessionId {
        self.session.identity()
    }

    pub fn policy(&self) -> EffectivePolicy {
        self.policy
    }

    pub fn manager(&self) -> &Arc<TxManager> {
        &self.manager
    }

    /// Number of scopes open on this session, this one included.
    pub fn depth(&self) -> Result<usize, TxError> {
        self.manager.depth(self.identity())
    }

    /// Close the scope with the block's result and apply the error policy.
    pub fn exit<T, E>(mut self, result: Result<T, E>) -> Outcome<T, E>
    where
        E: From<TxError> + std::fmt::Display,
    {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => {
                return Err(E::from(TxError::UnexpectedSessionState {
                    session: self.identity(),
                    detail: "scope already closed".into(),
                }))
            }
        };

        let outcome = match &result {
            Ok(_) => CloseOutcome::Success,
            Err(err) => CloseOutcome::Failure(CapturedError::new(FailureKind::Caller, err.to_string())),
        };

        let closed = match self.manager.close(self.session.as_ref(), handle, outcome) {
            Ok(closed) => closed,
            Err(tx_err) => {
                if let Err(err) = &result {
                    tracing::error!(error = %err, "failure superseded by a scope contract violation");
                }
                return Err(E::from(tx_err));
            }
        };

        match result {
            Ok(value) => match closed.error() {
                None => Ok(Completion::succeeded(value, closed)),
                Some(captured) => {
                    let err = E::from(engine_error(captured, closed.identity()));
                    apply_policy(self.policy.error_policy, err, closed)
                }
            },
            Err(err) => apply_policy(self.policy.error_policy, err, closed),
        }
    }
}

impl Drop for ActiveScope {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let outcome = CloseOutcome::Failure(CapturedError::new(
                FailureKind::Caller,
                "scope dropped without exit",
            ));
            if let Err(err) = self.manager.close(self.session.as_ref(), handle, outcome) {
                tracing::error!(session = %self.session.identity(), error = %err, "failed to close abandoned scope");
            }
        }
    }
}

impl std::fmt::Debug for ActiveScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveScope")
            .field("session", &self.session.identity())
            .field("policy", &self.policy)
            .field("handle", &self.handle)
            .finish()
    }
}

fn engine_error(captured: &CapturedError, session: SessionId) -> TxError {
    match captured.kind {
        FailureKind::RollbackOnly => TxError::RollbackOnly { session },
        FailureKind::Database | FailureKind::Caller => TxError::Database(
            captured
                .database_error()
                .cloned()
                .unwrap_or_else(|| DatabaseError::new(captured.message.clone())),
        ),
    }
}

fn apply_policy<T, E>(policy: ErrorPolicy, err: E, closed: TransactionScope) -> Outcome<T, E> {
    match policy {
        ErrorPolicy::Raise => Err(err),
        ErrorPolicy::Status => Ok(Completion::failed(err, closed)),
    }
}

/// Scoped-context façade with per-instance configuration.
#[derive(Debug, Clone, Default)]
pub struct TxContext {
    manager: Option<Arc<TxManager>>,
    instance: PolicyOverride,
    nested: bool,
}

impl TxContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit manager instead of the process-wide one.
    pub fn manager(mut self, manager: &Arc<TxManager>) -> Self {
        self.manager = Some(Arc::clone(manager));
        self
    }

    /// Per-instance policy overrides.
    pub fn config(mut self, overrides: PolicyOverride) -> Self {
        self.instance = overrides;
        self
    }

    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.instance.error_policy = Some(policy);
        self
    }

    pub fn existing_txn_policy(mut self, policy: ExistingTxnPolicy) -> Self {
        self.instance.existing_txn_policy = Some(policy);
        self
    }

    /// Open as a savepoint when another scope already owns the transaction.
    pub fn nested(mut self, nested: bool) -> Self {
        self.nested = nested;
        self
    }

    /// Open the scope and return its guard.
    pub fn enter(&self) -> Result<ActiveScope, TxError> {
        ScopeRequest {
            manager: self.manager.clone(),
            call_site: CallSite::Inherited,
            instance: self.instance,
            nested: self.nested,
        }
        .open()
    }

    /// Run `f` inside a scope.
    pub fn run<T, E, F>(&self, f: F) -> Outcome<T, E>
    where
        F: FnOnce(&ActiveScope) -> Result<T, E>,
        E: From<TxError> + std::fmt::Display,
    {
        let scope = self.enter().map_err(E::from)?;
        let result = f(&scope);
        scope.exit(result)
    }
}
