//! Per-execution-context stacks of open transaction scopes.

use std::collections::HashMap;

use crate::error::{DatabaseError, TxError};
use crate::policy::{EffectivePolicy, PolicyOverride};
use crate::session::{SavepointToken, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeRole {
    /// Holds commit/rollback authority for the session.
    Root,
    /// Shares an ancestor's transaction (or a savepoint inside it).
    Joined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeStatus {
    Open,
    Committed,
    RolledBack,
    /// The rollback itself did not complete cleanly. Terminal, never retried.
    Failed,
}

/// Which side produced a captured failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Raised by the code running inside the scope.
    Caller,
    /// Raised by the session while beginning, committing or rolling back.
    Database,
    /// The scope succeeded but a joined descendant had failed.
    RollbackOnly,
}

/// Description of the last failure a scope saw.
#[derive(Debug, Clone)]
pub struct CapturedError {
    pub kind: FailureKind,
    pub message: String,
    database: Option<DatabaseError>,
}

impl CapturedError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            database: None,
        }
    }

    pub fn database(err: DatabaseError) -> Self {
        Self {
            kind: FailureKind::Database,
            message: err.to_string(),
            database: Some(err),
        }
    }

    /// The session error behind a `Database` failure.
    pub fn database_error(&self) -> Option<&DatabaseError> {
        self.database.as_ref()
    }
}

impl std::fmt::Display for CapturedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Extra data recorded on a scope when it is pushed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeSettings {
    pub policy: EffectivePolicy,
    /// Call-site overrides this scope was opened with; inherited by scoped
    /// contexts opened beneath it.
    pub call_site: PolicyOverride,
    /// The root adopted an ambient transaction instead of beginning one.
    pub adopted_ambient: bool,
}

/// One open context block or decorated call.
#[derive(Debug, Clone)]
pub struct TransactionScope {
    id: u64,
    identity: SessionId,
    role: ScopeRole,
    status: ScopeStatus,
    error: Option<CapturedError>,
    savepoint: Option<SavepointToken>,
    settings: ScopeSettings,
    tainted: bool,
    abandoned: bool,
}

impl TransactionScope {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn identity(&self) -> SessionId {
        self.identity
    }

    pub fn role(&self) -> ScopeRole {
        self.role
    }

    pub fn status(&self) -> ScopeStatus {
        self.status
    }

    pub fn error(&self) -> Option<&CapturedError> {
        self.error.as_ref()
    }

    pub fn savepoint(&self) -> Option<&SavepointToken> {
        self.savepoint.as_ref()
    }

    pub fn policy(&self) -> EffectivePolicy {
        self.settings.policy
    }

    pub fn call_site(&self) -> PolicyOverride {
        self.settings.call_site
    }

    pub fn adopted_ambient(&self) -> bool {
        self.settings.adopted_ambient
    }

    /// A joined descendant failed; committing this scope is no longer allowed.
    pub fn is_tainted(&self) -> bool {
        self.tainted
    }

    /// Its owner tried to close it while scopes above it were still open.
    /// It rolls back as soon as it becomes the top again.
    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    pub(crate) fn taint(&mut self) {
        self.tainted = true;
    }

    pub(crate) fn finish(&mut self, status: ScopeStatus, error: Option<CapturedError>) {
        self.status = status;
        if error.is_some() {
            self.error = error;
        }
    }
}

/// Proof of ownership for a pushed scope. Only its owner can close it.
#[derive(Debug)]
pub struct ScopeHandle {
    identity: SessionId,
    id: u64,
}

impl ScopeHandle {
    pub fn identity(&self) -> SessionId {
        self.identity
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Ordered scopes for one session identity; the last element is the innermost.
#[derive(Debug)]
pub struct ScopeStack {
    identity: SessionId,
    scopes: Vec<TransactionScope>,
    next_id: u64,
}

impl ScopeStack {
    pub fn new(identity: SessionId) -> Self {
        Self {
            identity,
            scopes: Vec::new(),
            next_id: 1,
        }
    }

    pub fn push(
        &mut self,
        role: ScopeRole,
        savepoint: Option<SavepointToken>,
        settings: ScopeSettings,
    ) -> ScopeHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.scopes.push(TransactionScope {
            id,
            identity: self.identity,
            role,
            status: ScopeStatus::Open,
            error: None,
            savepoint,
            settings,
            tainted: false,
            abandoned: false,
        });
        ScopeHandle {
            identity: self.identity,
            id,
        }
    }

    pub fn top(&self) -> Option<&TransactionScope> {
        self.scopes.last()
    }

    pub(crate) fn top_mut(&mut self) -> Option<&mut TransactionScope> {
        self.scopes.last_mut()
    }

    /// Borrow the scope `handle` refers to, provided it is the top.
    pub(crate) fn top_for(&mut self, handle: &ScopeHandle) -> Result<&mut TransactionScope, TxError> {
        let identity = self.identity;
        match self.scopes.last_mut() {
            Some(top) if top.id == handle.id && handle.identity == identity => Ok(top),
            other => Err(TxError::ScopeOrderViolation {
                session: identity,
                expected: other.map(|s| s.id),
                found: handle.id,
            }),
        }
    }

    /// Remove the top scope. Fails if `handle` is not the top.
    pub fn pop(&mut self, handle: &ScopeHandle) -> Result<TransactionScope, TxError> {
        self.top_for(handle)?;
        self.scopes.pop().ok_or(TxError::ScopeOrderViolation {
            session: self.identity,
            expected: None,
            found: handle.id,
        })
    }

    /// Mark the scope `handle` refers to for closing once it reaches the top.
    /// Returns `false` if no such scope is on the stack.
    pub(crate) fn abandon(&mut self, handle: &ScopeHandle) -> bool {
        if handle.identity != self.identity {
            return false;
        }
        match self.scopes.iter_mut().find(|s| s.id == handle.id) {
            Some(scope) => {
                scope.abandoned = true;
                true
            }
            None => false,
        }
    }

    /// Remove the top scope if it was abandoned by its owner.
    pub(crate) fn pop_abandoned(&mut self) -> Option<TransactionScope> {
        if self.scopes.last().is_some_and(|s| s.abandoned) {
            self.scopes.pop()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransactionScope> {
        self.scopes.iter()
    }

    pub fn root_count(&self) -> usize {
        self.scopes.iter().filter(|s| s.role == ScopeRole::Root).count()
    }
}

/// All scope stacks of one execution context, keyed by session identity.
#[derive(Debug, Default)]
pub struct ScopeStacks {
    stacks: HashMap<SessionId, ScopeStack>,
}

impl ScopeStacks {
    pub fn get(&self, identity: SessionId) -> Option<&ScopeStack> {
        self.stacks.get(&identity)
    }

    /// The stack for `identity`, created on first use.
    pub fn stack_mut(&mut self, identity: SessionId) -> &mut ScopeStack {
        self.stacks
            .entry(identity)
            .or_insert_with(|| ScopeStack::new(identity))
    }

    pub fn depth(&self, identity: SessionId) -> usize {
        self.stacks.get(&identity).map_or(0, ScopeStack::len)
    }

    pub fn top(&self, identity: SessionId) -> Option<&TransactionScope> {
        self.stacks.get(&identity).and_then(ScopeStack::top)
    }
}
