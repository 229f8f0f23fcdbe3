use std::sync::Arc;

use crate::session::SessionId;

/// A failure reported by a [`SessionHandle`](crate::SessionHandle) operation.
///
/// Cloneable so the engine can record it on the closed scope and still hand
/// it to the caller's error type.
#[derive(Clone)]
pub struct DatabaseError {
    message: String,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl DatabaseError {
    /// A database error carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap any driver error, keeping it as the `source`.
    ///
    /// Used by backend crates (e.g. `txscope-data-diesel`) to wrap
    /// driver-specific errors.
    pub fn from_source(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            message: err.to_string(),
            source: Some(Arc::new(err)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for DatabaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DatabaseError({:?})", self.message)
    }
}

impl std::error::Error for DatabaseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.source {
            Some(err) => Some(err.as_ref()),
            None => None,
        }
    }
}

/// Errors raised by the transaction engine.
///
/// Programming-error variants (see [`TxError::is_programming_error`]) always
/// propagate, whatever the effective error policy says.
#[derive(Debug, Clone)]
pub enum TxError {
    /// A façade was used before [`configure`](crate::configure) ran.
    NotConfigured,
    /// [`configure`](crate::configure) was called more than once.
    AlreadyConfigured,
    /// The execution-context accessor has no context for this caller.
    ContextUnavailable(String),
    /// The session already had a transaction open and the policy refused it.
    AmbientTransactionConflict { session: SessionId, reason: String },
    /// A scope was closed while it was not the top of its stack.
    ScopeOrderViolation {
        session: SessionId,
        expected: Option<u64>,
        found: u64,
    },
    /// The session no longer matches what the open scopes expect, usually
    /// because someone committed or rolled back behind the engine's back.
    UnexpectedSessionState { session: SessionId, detail: String },
    /// A root scope rolled back because a joined descendant failed.
    RollbackOnly { session: SessionId },
    /// A begin / commit / rollback / savepoint call failed.
    Database(DatabaseError),
}

impl TxError {
    /// Whether this error signals a violated nesting or configuration
    /// contract rather than a runtime failure.
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            TxError::NotConfigured
                | TxError::AlreadyConfigured
                | TxError::ContextUnavailable(_)
                | TxError::ScopeOrderViolation { .. }
                | TxError::UnexpectedSessionState { .. }
        )
    }
}

impl std::fmt::Display for TxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxError::NotConfigured => write!(
                f,
                "transaction scopes are not configured; call txscope::configure(...) first"
            ),
            TxError::AlreadyConfigured => write!(f, "transaction scopes are already configured"),
            TxError::ContextUnavailable(msg) => write!(f, "No execution context: {msg}"),
            TxError::AmbientTransactionConflict { session, reason } => {
                write!(f, "Session {session} already has a transaction open: {reason}")
            }
            TxError::ScopeOrderViolation {
                session,
                expected,
                found,
            } => match expected {
                Some(top) => write!(
                    f,
                    "Scope {found} closed out of order on session {session} (top is scope {top})"
                ),
                None => write!(
                    f,
                    "Scope {found} closed on session {session} but no scope is open"
                ),
            },
            TxError::UnexpectedSessionState { session, detail } => {
                write!(f, "Unexpected state on session {session}: {detail}")
            }
            TxError::RollbackOnly { session } => write!(
                f,
                "Transaction on session {session} was rolled back because an inner scope failed"
            ),
            TxError::Database(err) => write!(f, "Database error: {err}"),
        }
    }
}

impl std::error::Error for TxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TxError::Database(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DatabaseError> for TxError {
    fn from(err: DatabaseError) -> Self {
        TxError::Database(err)
    }
}

pub type TxResult<T> = Result<T, TxError>;
