//! Nested transaction scopes over a pluggable session.
//!
//! A [`TxManager`] tracks, per execution context and per session identity, a
//! stack of open [`TransactionScope`]s. The outermost scope begins and ends
//! the session's transaction; scopes opened beneath it join that transaction
//! (or a savepoint inside it) and only record their outcome. Two façades
//! drive the engine: [`TxContext`] for explicit blocks and [`Transactional`]
//! (usually through `#[transactional]`) for whole functions.

pub mod completion;
pub mod config;
pub mod context;
pub mod decorator;
pub mod engine;
pub mod error;
pub mod manager;
pub mod policy;
pub mod prelude;
pub mod scope;
pub mod session;
pub mod stack;

pub use completion::{Completion, Outcome};
pub use config::{ConfigError, ConfigValue, FromConfigValue, TxConfig};
#[cfg(feature = "tokio")]
pub use context::TaskContext;
pub use context::{ContextAccessor, ThreadContext};
pub use decorator::Transactional;
pub use engine::{CloseOutcome, OpenOptions};
pub use error::{DatabaseError, TxError, TxResult};
pub use manager::{configure, global_manager, is_configured, Settings, TxManager};
pub use policy::{EffectivePolicy, ErrorPolicy, ExistingTxnPolicy, PolicyOverride};
pub use scope::{ActiveScope, TxContext};
pub use session::{
    SavepointToken, SessionHandle, SessionId, SessionProvider, SharedSession, TransactionOrigin,
};
pub use stack::{
    CapturedError, FailureKind, ScopeHandle, ScopeRole, ScopeStack, ScopeStacks, ScopeStatus,
    TransactionScope,
};

use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered by `RUST_LOG`.
///
/// Falls back to `info,txscope_core=debug` when `RUST_LOG` is not set. Does
/// nothing if a global subscriber is already installed.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,txscope_core=debug"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
