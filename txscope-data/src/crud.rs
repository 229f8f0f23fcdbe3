use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

use serde::Serialize;
use serde_json::Value;
use txscope_core::{ActiveScope, DatabaseError, SessionHandle};

use crate::entity::Entity;
use crate::error::DataError;
use crate::memory::MemorySession;
use crate::page::{Page, Pageable};
use crate::query::Query;

static GLOBAL_FILTERS: OnceLock<RwLock<HashMap<&'static str, Query>>> = OnceLock::new();

fn global_filters() -> &'static RwLock<HashMap<&'static str, Query>> {
    GLOBAL_FILTERS.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Outcome of the last operation on a [`Crud`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrudStatus {
    #[default]
    Ok,
    /// The session rejected a statement.
    SqlErr,
    /// Anything else went wrong (serialization, engine errors).
    InternalErr,
    /// An update or delete matched nothing.
    NotFound,
}

#[derive(Debug, Default)]
struct CrudState {
    status: CrudStatus,
    error: Option<String>,
}

/// Create/read/update/delete over one entity type.
///
/// Every query is narrowed by the instance's default filters and, unless
/// [`disable_global_filter`](Crud::disable_global_filter) was called, by the
/// filters registered for the entity's table.
///
/// ```ignore
/// TxContext::new().run(|scope| {
///     let users = Crud::<User>::bind(scope, &session)?.filter_by("tenant", 7)?;
///     users.add(User::new("a@example.com"))?;
///     Ok::<_, DataError>(users.count(&Query::new())?)
/// })?;
/// ```
pub struct Crud<T: Entity> {
    session: Arc<MemorySession>,
    defaults: Query,
    apply_global_filters: bool,
    state: Mutex<CrudState>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Crud<T> {
    pub fn new(session: &Arc<MemorySession>) -> Self {
        Self {
            session: Arc::clone(session),
            defaults: Query::new(),
            apply_global_filters: true,
            state: Mutex::new(CrudState::default()),
            _entity: PhantomData,
        }
    }

    /// A `Crud` that must run on the session `scope` is open on.
    pub fn bind(scope: &ActiveScope, session: &Arc<MemorySession>) -> Result<Self, DataError> {
        if scope.identity() != session.identity() {
            return Err(DataError::Other(format!(
                "scope is open on session {} but the CRUD session is {}",
                scope.identity(),
                session.identity()
            )));
        }
        Ok(Self::new(session))
    }

    /// Filters that apply to every query of `T` from any `Crud` instance.
    pub fn register_global_filters(query: Query) {
        global_filters()
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(T::table_name(), query);
    }

    pub fn clear_global_filters() {
        global_filters()
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(T::table_name());
    }

    /// Add a default equality filter for this instance.
    pub fn filter_by(mut self, column: &str, value: impl Serialize) -> Result<Self, DataError> {
        self.defaults = self.defaults.where_eq(column, value)?;
        Ok(self)
    }

    pub fn disable_global_filter(mut self) -> Self {
        self.apply_global_filters = false;
        self
    }

    pub fn status(&self) -> CrudStatus {
        self.lock_state().status
    }

    /// Message of the last failure, if the last operation failed.
    pub fn error(&self) -> Option<String> {
        self.lock_state().error.clone()
    }

    pub fn session(&self) -> &Arc<MemorySession> {
        &self.session
    }

    pub fn add(&self, entity: T) -> Result<T, DataError> {
        let result = self.insert(entity);
        self.track(result)
    }

    pub fn add_all(&self, entities: Vec<T>) -> Result<Vec<T>, DataError> {
        let result = entities
            .into_iter()
            .map(|entity| self.insert(entity))
            .collect();
        self.track(result)
    }

    pub fn first(&self, query: &Query) -> Result<Option<T>, DataError> {
        let result = self
            .select(query)
            .and_then(|rows| rows.into_iter().next().map(decode::<T>).transpose());
        self.track(result)
    }

    pub fn all(&self, query: &Query) -> Result<Vec<T>, DataError> {
        let result = self
            .select(query)
            .and_then(|rows| rows.into_iter().map(decode::<T>).collect());
        self.track(result)
    }

    pub fn count(&self, query: &Query) -> Result<u64, DataError> {
        let result = self.select(query).map(|rows| rows.len() as u64);
        self.track(result)
    }

    /// Apply `change` to the first matching row. Returns `None` (status
    /// `NotFound`) when nothing matches. The id cannot be changed.
    pub fn update(&self, query: &Query, change: impl FnOnce(&mut T)) -> Result<Option<T>, DataError> {
        let result = self.update_first(query, change);
        let result = self.track(result)?;
        if result.is_none() {
            self.set_state(CrudStatus::NotFound, None);
        }
        Ok(result)
    }

    /// Delete the first matching row, or every match when `all_records` is
    /// set. Returns how many rows went away; zero sets status `NotFound`.
    pub fn delete(&self, query: &Query, all_records: bool) -> Result<usize, DataError> {
        let result = self.delete_matching(query, all_records);
        let deleted = self.track(result)?;
        if deleted == 0 {
            self.set_state(CrudStatus::NotFound, None);
        }
        Ok(deleted)
    }

    pub fn paginate(&self, query: &Query, pageable: &Pageable) -> Result<Page<T>, DataError> {
        let result = self.paginate_rows(query, pageable);
        self.track(result)
    }

    fn insert(&self, mut entity: T) -> Result<T, DataError> {
        self.session.write(T::table_name(), |table| {
            let id = match entity.id() {
                Some(id) if table.contains(id) => {
                    return Err(DataError::database(DatabaseError::new(format!(
                        "duplicate key {id} in table {}",
                        T::table_name()
                    ))))
                }
                Some(id) => id,
                None => table.allocate_id(),
            };
            entity.set_id(id);
            table.put(id, serde_json::to_value(&entity)?);
            Ok(entity)
        })
    }

    fn update_first(&self, query: &Query, change: impl FnOnce(&mut T)) -> Result<Option<T>, DataError> {
        let Some(row) = self.select(query)?.into_iter().next() else {
            return Ok(None);
        };
        let id = row_id::<T>(&row)?;
        let mut entity = decode::<T>(row)?;
        change(&mut entity);
        entity.set_id(id);
        let value = serde_json::to_value(&entity)?;
        self.session.write(T::table_name(), |table| {
            table.put(id, value);
            Ok(())
        })?;
        Ok(Some(entity))
    }

    fn delete_matching(&self, query: &Query, all_records: bool) -> Result<usize, DataError> {
        let rows = self.select(query)?;
        let take = if all_records { rows.len() } else { rows.len().min(1) };
        let ids = rows
            .iter()
            .take(take)
            .map(row_id::<T>)
            .collect::<Result<Vec<_>, _>>()?;
        if ids.is_empty() {
            return Ok(0);
        }
        self.session.write(T::table_name(), |table| {
            Ok(ids.iter().filter(|id| table.remove(**id)).count())
        })
    }

    fn paginate_rows(&self, query: &Query, pageable: &Pageable) -> Result<Page<T>, DataError> {
        let (page, per_page) = pageable.normalized()?;
        let offset = (page - 1)
            .checked_mul(per_page)
            .and_then(|offset| usize::try_from(offset).ok());
        let offset = match offset {
            Some(offset) => offset,
            None if pageable.error_out => {
                return Err(DataError::Other("page is out of range".into()))
            }
            // past any row
            None => usize::MAX,
        };
        let limit = usize::try_from(per_page).unwrap_or(usize::MAX);
        let rows = self.select(query)?;

        if pageable.count {
            let total = rows.len() as u64;
            let pages = if total > 0 { total.div_ceil(per_page) } else { 0 };
            if pageable.error_out && total > 0 && page > pages {
                return Err(DataError::Other("page is out of range".into()));
            }
            let items = rows
                .into_iter()
                .skip(offset)
                .take(limit)
                .map(decode::<T>)
                .collect::<Result<Vec<T>, _>>()?;
            return Ok(Page::counted(items, page, per_page, total));
        }

        let batch = rows
            .into_iter()
            .skip(offset)
            .take(limit.saturating_add(1))
            .map(decode::<T>)
            .collect::<Result<Vec<T>, _>>()?;
        Ok(Page::uncounted(batch, page, per_page))
    }

    /// Matching rows in id order, then sorted by the query's ordering.
    fn select(&self, query: &Query) -> Result<Vec<Value>, DataError> {
        let mut effective = self.defaults.clone();
        if self.apply_global_filters {
            let filters = global_filters()
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(global) = filters.get(T::table_name()) {
                effective = effective.and(global);
            }
        }
        let effective = effective.and(query);

        let mut rows: Vec<Value> = self.session.read(T::table_name(), |table| {
            table
                .rows()
                .filter(|row| effective.matches(row))
                .cloned()
                .collect()
        });
        effective.sort(&mut rows);
        Ok(rows)
    }

    fn track<R>(&self, result: Result<R, DataError>) -> Result<R, DataError> {
        match &result {
            Ok(_) => self.set_state(CrudStatus::Ok, None),
            Err(err) => {
                let status = match err {
                    DataError::Database(_) => CrudStatus::SqlErr,
                    DataError::NotFound(_) => CrudStatus::NotFound,
                    DataError::Tx(_) | DataError::Other(_) => CrudStatus::InternalErr,
                };
                tracing::error!(
                    entity = T::table_name(),
                    status = ?status,
                    error = %err,
                    "CRUD operation failed"
                );
                self.set_state(status, Some(err.to_string()));
            }
        }
        result
    }

    fn set_state(&self, status: CrudStatus, error: Option<String>) {
        let mut state = self.lock_state();
        state.status = status;
        state.error = error;
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, CrudState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Entity> std::fmt::Debug for Crud<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crud")
            .field("entity", &T::table_name())
            .field("session", &self.session.identity())
            .field("apply_global_filters", &self.apply_global_filters)
            .finish_non_exhaustive()
    }
}

fn decode<T: Entity>(row: Value) -> Result<T, DataError> {
    Ok(serde_json::from_value(row)?)
}

fn row_id<T: Entity>(row: &Value) -> Result<i64, DataError> {
    row.get(T::id_column())
        .and_then(Value::as_i64)
        .ok_or_else(|| {
            DataError::Other(format!(
                "row in {} has no integer `{}` field",
                T::table_name(),
                T::id_column()
            ))
        })
}
