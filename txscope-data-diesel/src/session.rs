use std::sync::{Mutex, MutexGuard, PoisonError};

use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection, R2D2Connection};
use txscope_core::{
    DatabaseError, SavepointToken, SessionHandle, SessionId, TransactionOrigin,
};
use txscope_data::DataError;

use crate::error::DieselErrorExt;

struct State<C> {
    conn: C,
    origin: Option<TransactionOrigin>,
    savepoints: Vec<String>,
    savepoint_seq: u32,
}

/// A diesel connection driven by the transaction engine.
///
/// Transaction control is issued as plain SQL (`BEGIN`, `SAVEPOINT`, ...)
/// and tracked here, so statements run through
/// [`with_connection`](DieselSession::with_connection) must not open or end
/// transactions themselves (no `Connection::transaction`).
///
/// # Example
///
/// ```ignore
/// let session = Arc::new(DieselSession::new(SqliteConnection::establish(":memory:")?));
/// let provided = session.clone();
/// txscope::configure(Settings::new(move || provided.clone() as SharedSession))?;
///
/// TxContext::new().run(|_| {
///     session.with_connection(|conn| {
///         diesel::insert_into(users::table).values(&new_user).execute(conn)
///     }).map_err(DieselErrorExt::into_data_error)
/// })?;
/// ```
pub struct DieselSession<C> {
    id: SessionId,
    state: Mutex<State<C>>,
}

impl<C: SimpleConnection + Send> DieselSession<C> {
    pub fn new(conn: C) -> Self {
        Self {
            id: SessionId::next(),
            state: Mutex::new(State {
                conn,
                origin: None,
                savepoints: Vec::new(),
                savepoint_seq: 0,
            }),
        }
    }

    /// Run `f` against the underlying connection.
    pub fn with_connection<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        f(&mut self.lock().conn)
    }

    /// Hand the connection back, whatever transaction state it is in.
    pub fn into_inner(self) -> C {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .conn
    }

    fn lock(&self) -> MutexGuard<'_, State<C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn execute(&self, state: &mut State<C>, sql: &str) -> Result<(), DatabaseError> {
        tracing::trace!(session = %self.id, sql, "transaction control");
        state
            .conn
            .batch_execute(sql)
            .map_err(DieselErrorExt::into_database_error)
    }

    fn savepoint_position(state: &State<C>, token: &SavepointToken) -> Result<usize, DatabaseError> {
        state
            .savepoints
            .iter()
            .position(|name| name == token.name())
            .ok_or_else(|| DatabaseError::new(format!("no such savepoint: {token}")))
    }
}

impl<C> DieselSession<PooledConnection<ConnectionManager<C>>>
where
    C: diesel::Connection + R2D2Connection + Send + 'static,
{
    /// A session over a connection checked out of `pool`. The connection
    /// returns to the pool when the session is dropped.
    pub fn checkout(pool: &Pool<ConnectionManager<C>>) -> Result<Self, DataError> {
        let conn = pool.get().map_err(DieselErrorExt::into_data_error)?;
        Ok(Self::new(conn))
    }
}

impl<C: SimpleConnection + Send> SessionHandle for DieselSession<C> {
    fn identity(&self) -> SessionId {
        self.id
    }

    fn begin(&self) -> Result<(), DatabaseError> {
        let mut state = self.lock();
        if state.origin.is_some() {
            return Err(DatabaseError::new("a transaction is already begun on this session"));
        }
        self.execute(&mut state, "BEGIN")?;
        state.origin = Some(TransactionOrigin::Explicit);
        Ok(())
    }

    fn begin_nested(&self) -> Result<SavepointToken, DatabaseError> {
        let mut state = self.lock();
        if state.origin.is_none() {
            return Err(DatabaseError::new("no transaction to create a savepoint in"));
        }
        let name = format!("txscope_sp_{}", state.savepoint_seq + 1);
        self.execute(&mut state, &format!("SAVEPOINT {name}"))?;
        state.savepoint_seq += 1;
        state.savepoints.push(name.clone());
        Ok(SavepointToken::new(name))
    }

    fn commit(&self) -> Result<(), DatabaseError> {
        let mut state = self.lock();
        if state.origin.is_none() {
            return Err(DatabaseError::new("no transaction to commit"));
        }
        self.execute(&mut state, "COMMIT")?;
        state.origin = None;
        state.savepoints.clear();
        Ok(())
    }

    /// The session counts as idle afterwards even when `ROLLBACK` fails.
    fn rollback(&self) -> Result<(), DatabaseError> {
        let mut state = self.lock();
        let result = self.execute(&mut state, "ROLLBACK");
        state.origin = None;
        state.savepoints.clear();
        result
    }

    /// Rolls back to the savepoint and releases it, forgetting any savepoint
    /// created after it.
    fn rollback_to_savepoint(&self, token: &SavepointToken) -> Result<(), DatabaseError> {
        let mut state = self.lock();
        let pos = Self::savepoint_position(&state, token)?;
        self.execute(
            &mut state,
            &format!("ROLLBACK TO SAVEPOINT {0}; RELEASE SAVEPOINT {0}", token.name()),
        )?;
        state.savepoints.truncate(pos);
        Ok(())
    }

    fn release_savepoint(&self, token: &SavepointToken) -> Result<(), DatabaseError> {
        let mut state = self.lock();
        let pos = Self::savepoint_position(&state, token)?;
        self.execute(&mut state, &format!("RELEASE SAVEPOINT {}", token.name()))?;
        state.savepoints.truncate(pos);
        Ok(())
    }

    fn is_transaction_active(&self) -> bool {
        self.lock().origin.is_some()
    }

    fn transaction_origin(&self) -> Option<TransactionOrigin> {
        self.lock().origin
    }
}

impl<C> std::fmt::Debug for DieselSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DieselSession")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
