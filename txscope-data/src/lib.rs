//! CRUD helpers that run inside txscope transaction scopes.

pub mod crud;
pub mod entity;
pub mod error;
pub mod memory;
pub mod page;
pub mod query;

pub use crud::{Crud, CrudStatus};
pub use entity::Entity;
pub use error::DataError;
pub use memory::MemorySession;
pub use page::{Page, Pageable};
pub use query::Query;

pub mod prelude {
    //! Re-exports of the most commonly used data types.
    pub use crate::{Crud, CrudStatus, DataError, Entity, MemorySession, Page, Pageable, Query};
}
