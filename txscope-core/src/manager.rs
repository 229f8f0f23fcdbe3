//! Process-wide and explicit engine configuration.

use std::sync::{Arc, OnceLock};

use crate::config::{ConfigError, TxConfig};
use crate::context::{ContextAccessor, ThreadContext};
use crate::error::TxError;
use crate::policy::{ErrorPolicy, ExistingTxnPolicy, PolicyOverride};
use crate::session::{SessionProvider, SharedSession};

static GLOBAL_MANAGER: OnceLock<Arc<TxManager>> = OnceLock::new();

/// Builder for a [`TxManager`].
///
/// ```ignore
/// let settings = Settings::new(move || session.clone())
///     .error_policy(ErrorPolicy::Raise)
///     .existing_txn_policy(ExistingTxnPolicy::AdoptAutobegin);
/// txscope_core::configure(settings)?;
/// ```
#[derive(Clone)]
pub struct Settings {
    provider: SessionProvider,
    global: PolicyOverride,
    context: Arc<dyn ContextAccessor>,
}

impl Settings {
    pub fn new<F>(provider: F) -> Self
    where
        F: Fn() -> SharedSession + Send + Sync + 'static,
    {
        Self {
            provider: Arc::new(provider),
            global: PolicyOverride::NONE,
            context: Arc::new(ThreadContext),
        }
    }

    /// Settings whose process-wide tier comes from a loaded [`TxConfig`].
    ///
    /// Reads `txscope.error_policy` and `txscope.existing_txn_policy`; missing
    /// keys leave the tier unset.
    pub fn from_config<F>(config: &TxConfig, provider: F) -> Result<Self, ConfigError>
    where
        F: Fn() -> SharedSession + Send + Sync + 'static,
    {
        let mut settings = Self::new(provider);
        settings.global = config.policy_override()?;
        Ok(settings)
    }

    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.global.error_policy = Some(policy);
        self
    }

    pub fn existing_txn_policy(mut self, policy: ExistingTxnPolicy) -> Self {
        self.global.existing_txn_policy = Some(policy);
        self
    }

    /// Use a different execution-context accessor (default: per thread).
    pub fn context(mut self, accessor: impl ContextAccessor + 'static) -> Self {
        self.context = Arc::new(accessor);
        self
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("global", &self.global)
            .field("context", &self.context.name())
            .finish_non_exhaustive()
    }
}

/// A configured transaction engine.
///
/// Usually installed once through [`configure`]; tests and multi-database
/// hosts can build their own and hand it to the façades with `.manager(..)`.
pub struct TxManager {
    provider: SessionProvider,
    global: PolicyOverride,
    context: Arc<dyn ContextAccessor>,
}

impl TxManager {
    pub fn new(settings: Settings) -> Self {
        Self {
            provider: settings.provider,
            global: settings.global,
            context: settings.context,
        }
    }

    /// The session the current caller should use.
    pub fn session(&self) -> SharedSession {
        (self.provider)()
    }

    /// The process-wide policy tier.
    pub fn global_policy(&self) -> PolicyOverride {
        self.global
    }

    pub fn context(&self) -> &dyn ContextAccessor {
        self.context.as_ref()
    }
}

impl std::fmt::Debug for TxManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxManager")
            .field("global", &self.global)
            .field("context", &self.context.name())
            .finish_non_exhaustive()
    }
}

/// Install the process-wide manager. Must run exactly once, before any
/// façade is used without an explicit manager.
pub fn configure(settings: Settings) -> Result<(), TxError> {
    let manager = Arc::new(TxManager::new(settings));
    GLOBAL_MANAGER
        .set(manager)
        .map_err(|_| TxError::AlreadyConfigured)?;
    tracing::debug!("transaction scopes configured");
    Ok(())
}

/// The process-wide manager, or `NotConfigured`.
pub fn global_manager() -> Result<Arc<TxManager>, TxError> {
    GLOBAL_MANAGER.get().cloned().ok_or(TxError::NotConfigured)
}

pub fn is_configured() -> bool {
    GLOBAL_MANAGER.get().is_some()
}
