//! The contract the engine expects from an underlying database session.
//!
//! The engine never talks to a driver directly: everything goes through
//! [`SessionHandle`]. Backends live in other crates (`txscope-data` ships an
//! in-memory session, `txscope-data-diesel` wraps a diesel connection).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::DatabaseError;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a session. Scope stacks are keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocate a process-unique id. Call once per session object.
    pub fn next() -> Self {
        SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn from_raw(raw: u64) -> Self {
        SessionId(raw)
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to a savepoint returned by [`SessionHandle::begin_nested`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SavepointToken(String);

impl SavepointToken {
    pub fn new(name: impl Into<String>) -> Self {
        SavepointToken(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SavepointToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How an already-active transaction came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOrigin {
    /// Someone issued an explicit `begin`.
    Explicit,
    /// The driver began it implicitly as a side effect of a statement.
    Autobegin,
}

/// A database session the engine can drive.
///
/// Methods take `&self`: one session is shared by every scope nested on it,
/// so implementations keep their connection behind interior mutability.
/// Every fallible call reports a [`DatabaseError`]; the engine treats all of
/// them the same way (rollback, then apply the error policy).
pub trait SessionHandle: Send + Sync {
    /// Stable identity of this session.
    fn identity(&self) -> SessionId;

    fn begin(&self) -> Result<(), DatabaseError>;

    /// Open a savepoint inside the current transaction.
    fn begin_nested(&self) -> Result<SavepointToken, DatabaseError>;

    fn commit(&self) -> Result<(), DatabaseError>;

    fn rollback(&self) -> Result<(), DatabaseError>;

    /// Discard everything done since `token` was created, keeping the
    /// enclosing transaction open.
    fn rollback_to_savepoint(&self, token: &SavepointToken) -> Result<(), DatabaseError>;

    /// Fold the savepoint into the enclosing transaction.
    fn release_savepoint(&self, token: &SavepointToken) -> Result<(), DatabaseError>;

    fn is_transaction_active(&self) -> bool;

    /// Where the active transaction came from, when the session can tell.
    fn transaction_origin(&self) -> Option<TransactionOrigin> {
        None
    }
}

/// Shared, dynamically typed session.
pub type SharedSession = Arc<dyn SessionHandle>;

/// Function returning the session to use for the current caller.
pub type SessionProvider = Arc<dyn Fn() -> SharedSession + Send + Sync>;
