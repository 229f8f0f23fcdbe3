//! An in-memory [`SessionHandle`] with real transaction semantics.
//!
//! Committed state and the working copy of the open transaction are kept
//! separately; savepoints snapshot the working copy. Like a database
//! driver, the session begins a transaction on its own (autobegin) the
//! first time data is touched while none is active.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use txscope_core::{DatabaseError, SavepointToken, SessionHandle, SessionId, TransactionOrigin};

use crate::entity::Entity;
use crate::error::DataError;

#[derive(Debug, Clone, Default)]
pub(crate) struct Table {
    rows: BTreeMap<i64, Value>,
    next_id: i64,
}

impl Table {
    pub(crate) fn rows(&self) -> impl Iterator<Item = &Value> {
        self.rows.values()
    }

    pub(crate) fn contains(&self, id: i64) -> bool {
        self.rows.contains_key(&id)
    }

    /// Id for a new row when the entity does not bring its own.
    pub(crate) fn allocate_id(&mut self) -> i64 {
        self.next_id = self.next_id.max(1);
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub(crate) fn put(&mut self, id: i64, row: Value) {
        self.next_id = self.next_id.max(id + 1);
        self.rows.insert(id, row);
    }

    pub(crate) fn remove(&mut self, id: i64) -> bool {
        self.rows.remove(&id).is_some()
    }
}

type Tables = BTreeMap<String, Table>;

#[derive(Debug, Default)]
struct Inner {
    committed: Tables,
    working: Option<Tables>,
    origin: Option<TransactionOrigin>,
    savepoints: Vec<(String, Tables)>,
    savepoint_seq: u32,
    read_only: bool,
}

impl Inner {
    fn working(&mut self, identity: SessionId) -> &mut Tables {
        if self.working.is_none() {
            tracing::debug!(session = %identity, "autobegin");
            self.origin = Some(TransactionOrigin::Autobegin);
        }
        let committed = &self.committed;
        self.working.get_or_insert_with(|| committed.clone())
    }

    fn end_transaction(&mut self) {
        self.working = None;
        self.origin = None;
        self.savepoints.clear();
    }

    fn savepoint_position(&self, token: &SavepointToken) -> Result<usize, DatabaseError> {
        self.savepoints
            .iter()
            .position(|(name, _)| name == token.name())
            .ok_or_else(|| DatabaseError::new(format!("no such savepoint: {token}")))
    }
}

#[derive(Debug)]
pub struct MemorySession {
    id: SessionId,
    inner: Mutex<Inner>,
}

impl Default for MemorySession {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySession {
    pub fn new() -> Self {
        Self {
            id: SessionId::next(),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reject every write with a database error until switched back.
    pub fn set_read_only(&self, read_only: bool) {
        self.lock().read_only = read_only;
    }

    /// Rows of `T` as last committed, ignoring any open transaction.
    pub fn committed<T: Entity>(&self) -> Result<Vec<T>, DataError> {
        let inner = self.lock();
        match inner.committed.get(T::table_name()) {
            Some(table) => table
                .rows()
                .map(|row| serde_json::from_value(row.clone()).map_err(DataError::from))
                .collect(),
            None => Ok(Vec::new()),
        }
    }

    pub(crate) fn read<R>(&self, table: &str, f: impl FnOnce(&Table) -> R) -> R {
        let mut inner = self.lock();
        let tables = inner.working(self.id);
        match tables.get(table) {
            Some(t) => f(t),
            None => f(&Table::default()),
        }
    }

    pub(crate) fn write<R>(
        &self,
        table: &str,
        f: impl FnOnce(&mut Table) -> Result<R, DataError>,
    ) -> Result<R, DataError> {
        let mut inner = self.lock();
        if inner.read_only {
            return Err(DatabaseError::new("cannot write in a read-only session").into());
        }
        let tables = inner.working(self.id);
        f(tables.entry(table.to_string()).or_default())
    }
}

impl SessionHandle for MemorySession {
    fn identity(&self) -> SessionId {
        self.id
    }

    fn begin(&self) -> Result<(), DatabaseError> {
        let mut inner = self.lock();
        if inner.working.is_some() {
            return Err(DatabaseError::new("a transaction is already begun on this session"));
        }
        inner.working = Some(inner.committed.clone());
        inner.origin = Some(TransactionOrigin::Explicit);
        Ok(())
    }

    fn begin_nested(&self) -> Result<SavepointToken, DatabaseError> {
        let mut inner = self.lock();
        let snapshot = inner
            .working
            .clone()
            .ok_or_else(|| DatabaseError::new("no transaction to create a savepoint in"))?;
        inner.savepoint_seq += 1;
        let name = format!("sp_{}", inner.savepoint_seq);
        inner.savepoints.push((name.clone(), snapshot));
        Ok(SavepointToken::new(name))
    }

    fn commit(&self) -> Result<(), DatabaseError> {
        let mut inner = self.lock();
        let working = inner
            .working
            .take()
            .ok_or_else(|| DatabaseError::new("no transaction to commit"))?;
        inner.committed = working;
        inner.end_transaction();
        Ok(())
    }

    fn rollback(&self) -> Result<(), DatabaseError> {
        self.lock().end_transaction();
        Ok(())
    }

    /// Restores the snapshot and forgets the savepoint along with any
    /// created after it.
    fn rollback_to_savepoint(&self, token: &SavepointToken) -> Result<(), DatabaseError> {
        let mut inner = self.lock();
        let pos = inner.savepoint_position(token)?;
        let (_, snapshot) = inner
            .savepoints
            .drain(pos..)
            .next()
            .ok_or_else(|| DatabaseError::new(format!("no such savepoint: {token}")))?;
        inner.working = Some(snapshot);
        Ok(())
    }

    fn release_savepoint(&self, token: &SavepointToken) -> Result<(), DatabaseError> {
        let mut inner = self.lock();
        let pos = inner.savepoint_position(token)?;
        inner.savepoints.truncate(pos);
        Ok(())
    }

    fn is_transaction_active(&self) -> bool {
        self.lock().working.is_some()
    }

    fn transaction_origin(&self) -> Option<TransactionOrigin> {
        self.lock().origin
    }
}
