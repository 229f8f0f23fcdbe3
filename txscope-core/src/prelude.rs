//! Everything a caller of the façades usually needs.
//!
//! ```ignore
//! use txscope_core::prelude::*;
//! ```

pub use crate::completion::{Completion, Outcome};
pub use crate::decorator::Transactional;
pub use crate::error::{DatabaseError, TxError};
pub use crate::manager::{configure, Settings, TxManager};
pub use crate::policy::{ErrorPolicy, ExistingTxnPolicy, PolicyOverride};
pub use crate::scope::{ActiveScope, TxContext};
pub use crate::session::{SavepointToken, SessionHandle, SessionId, SharedSession, TransactionOrigin};
pub use crate::stack::{ScopeRole, ScopeStatus};
