//! txscope: nested transaction scopes over a pluggable database session.
//!
//! This facade crate re-exports the txscope sub-crates through a single
//! dependency with feature flags. Import everything you need with:
//!
//! ```ignore
//! use txscope::prelude::*;
//! ```
//!
//! # Feature flags
//!
//! | Feature       | Default | Crate                          |
//! |---------------|---------|--------------------------------|
//! | `data`        | **yes** | `txscope-data`                 |
//! | `data-diesel` | no      | `txscope-data-diesel`          |
//! | `sqlite`      | no      | `txscope-data-diesel/sqlite`   |
//! | `postgres`    | no      | `txscope-data-diesel/postgres` |
//! | `mysql`       | no      | `txscope-data-diesel/mysql`    |
//! | `tokio`       | no      | `txscope-core/tokio`           |
//! | `full`        | no      | All of the above but drivers   |

// `#[transactional]` uses `proc-macro-crate` to detect whether the user
// depends on `txscope` or `txscope-core` and generates paths accordingly.
pub extern crate txscope_core;
pub extern crate txscope_macros;

pub use txscope_core::*;

pub use txscope_macros::transactional;

#[cfg(feature = "data")]
pub use txscope_data;

#[cfg(feature = "data-diesel")]
pub use txscope_data_diesel;

pub mod prelude {
    //! Re-exports of the most commonly used types.
    pub use txscope_core::prelude::*;
    pub use txscope_macros::transactional;

    #[cfg(feature = "data")]
    pub use txscope_data::prelude::*;

    #[cfg(feature = "data-diesel")]
    pub use txscope_data_diesel::{DieselErrorExt, DieselSession};
}
