#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use txscope_core::{
    DatabaseError, SavepointToken, SessionHandle, SessionId, Settings, SharedSession,
    TransactionOrigin, TxError, TxManager,
};

/// In-memory session that records every call the engine makes.
pub struct FakeSession {
    id: SessionId,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    active: bool,
    origin: Option<TransactionOrigin>,
    savepoints: Vec<String>,
    next_savepoint: u32,
    events: Vec<String>,
    failing: HashSet<&'static str>,
}

impl FakeSession {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeSession {
            id: SessionId::next(),
            state: Mutex::new(State::default()),
        })
    }

    /// A session that already has a transaction open, as if the driver (or
    /// some other code) had started one.
    pub fn with_ambient(origin: TransactionOrigin) -> Arc<Self> {
        let session = Self::new();
        {
            let mut state = session.state.lock().unwrap();
            state.active = true;
            state.origin = Some(origin);
        }
        session
    }

    /// Make `op` ("begin", "commit", "rollback", "savepoint", "rollback_to",
    /// "release") fail from now on.
    pub fn fail_on(&self, op: &'static str) {
        self.state.lock().unwrap().failing.insert(op);
    }

    pub fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().unwrap().active
    }

    /// A manager whose provider always hands out this session.
    pub fn manager(self: &Arc<Self>) -> Arc<TxManager> {
        Arc::new(TxManager::new(self.settings()))
    }

    pub fn settings(self: &Arc<Self>) -> Settings {
        let session = Arc::clone(self);
        Settings::new(move || session.clone() as SharedSession)
    }

    fn record(&self, op: &'static str, event: String) -> Result<(), DatabaseError> {
        let mut state = self.state.lock().unwrap();
        state.events.push(event);
        if state.failing.contains(op) {
            return Err(DatabaseError::new(format!("{op} failed")));
        }
        Ok(())
    }
}

impl SessionHandle for FakeSession {
    fn identity(&self) -> SessionId {
        self.id
    }

    fn begin(&self) -> Result<(), DatabaseError> {
        self.record("begin", "begin".into())?;
        let mut state = self.state.lock().unwrap();
        state.active = true;
        state.origin = Some(TransactionOrigin::Explicit);
        Ok(())
    }

    fn begin_nested(&self) -> Result<SavepointToken, DatabaseError> {
        let name = {
            let mut state = self.state.lock().unwrap();
            state.next_savepoint += 1;
            format!("sp{}", state.next_savepoint)
        };
        self.record("savepoint", format!("savepoint {name}"))?;
        self.state.lock().unwrap().savepoints.push(name.clone());
        Ok(SavepointToken::new(name))
    }

    fn commit(&self) -> Result<(), DatabaseError> {
        self.record("commit", "commit".into())?;
        let mut state = self.state.lock().unwrap();
        state.active = false;
        state.origin = None;
        state.savepoints.clear();
        Ok(())
    }

    fn rollback(&self) -> Result<(), DatabaseError> {
        self.record("rollback", "rollback".into())?;
        let mut state = self.state.lock().unwrap();
        state.active = false;
        state.origin = None;
        state.savepoints.clear();
        Ok(())
    }

    fn rollback_to_savepoint(&self, token: &SavepointToken) -> Result<(), DatabaseError> {
        self.record("rollback_to", format!("rollback_to {token}"))?;
        let mut state = self.state.lock().unwrap();
        if let Some(pos) = state.savepoints.iter().position(|s| s == token.name()) {
            state.savepoints.truncate(pos);
        }
        Ok(())
    }

    fn release_savepoint(&self, token: &SavepointToken) -> Result<(), DatabaseError> {
        self.record("release", format!("release {token}"))?;
        let mut state = self.state.lock().unwrap();
        if let Some(pos) = state.savepoints.iter().position(|s| s == token.name()) {
            state.savepoints.truncate(pos);
        }
        Ok(())
    }

    fn is_transaction_active(&self) -> bool {
        self.state.lock().unwrap().active
    }

    fn transaction_origin(&self) -> Option<TransactionOrigin> {
        let state = self.state.lock().unwrap();
        if state.active {
            state.origin
        } else {
            None
        }
    }
}

/// Caller error type used by the tests.
#[derive(Debug)]
pub enum AppError {
    Tx(TxError),
    Business(String),
}

impl AppError {
    pub fn business(msg: &str) -> Self {
        AppError::Business(msg.to_string())
    }

    pub fn tx(&self) -> Option<&TxError> {
        match self {
            AppError::Tx(err) => Some(err),
            AppError::Business(_) => None,
        }
    }
}

impl From<TxError> for AppError {
    fn from(err: TxError) -> Self {
        AppError::Tx(err)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Tx(err) => write!(f, "{err}"),
            AppError::Business(msg) => write!(f, "business error: {msg}"),
        }
    }
}
