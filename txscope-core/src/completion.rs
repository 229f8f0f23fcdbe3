use crate::error::TxError;
use crate::stack::{CapturedError, ScopeRole, ScopeStatus, TransactionScope};

/// What a façade hands back once its scope is closed.
///
/// - Success: `value` is set and `status` is `Committed`.
/// - Failure under `ErrorPolicy::Status`: `value` is `None`, `status` is
///   `RolledBack` (or `Failed`) and `error` holds the failure.
///
/// Under `ErrorPolicy::Raise` failures never reach a `Completion`; the
/// façade returns them as `Err`.
#[derive(Debug)]
pub struct Completion<T, E> {
    value: Option<T>,
    error: Option<E>,
    scope: TransactionScope,
}

/// Result type of both façades.
pub type Outcome<T, E> = Result<Completion<T, E>, E>;

impl<T, E> Completion<T, E> {
    pub(crate) fn succeeded(value: T, scope: TransactionScope) -> Self {
        Self {
            value: Some(value),
            error: None,
            scope,
        }
    }

    pub(crate) fn failed(error: E, scope: TransactionScope) -> Self {
        Self {
            value: None,
            error: Some(error),
            scope,
        }
    }

    pub fn status(&self) -> ScopeStatus {
        self.scope.status()
    }

    pub fn role(&self) -> ScopeRole {
        self.scope.role()
    }

    pub fn is_committed(&self) -> bool {
        self.scope.status() == ScopeStatus::Committed
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }

    /// The failure swallowed under `ErrorPolicy::Status`.
    pub fn error(&self) -> Option<&E> {
        self.error.as_ref()
    }

    /// Engine-side description of the failure (kind + message).
    pub fn captured(&self) -> Option<&CapturedError> {
        self.scope.error()
    }

    /// The closed scope record.
    pub fn scope(&self) -> &TransactionScope {
        &self.scope
    }

    /// Re-raise a swallowed failure, or return the committed value.
    pub fn into_result(self) -> Result<T, E>
    where
        E: From<TxError>,
    {
        match (self.value, self.error) {
            (Some(value), _) => Ok(value),
            (None, Some(err)) => Err(err),
            (None, None) => Err(E::from(TxError::RollbackOnly {
                session: self.scope.identity(),
            })),
        }
    }
}
