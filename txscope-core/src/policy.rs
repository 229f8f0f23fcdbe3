//! Error policy resolution.
//!
//! A scope's behaviour is decided once, at open time, from four tiers:
//! call-site (decorator or inherited from one) > per-instance > process-wide
//! > built-in default. Each field is resolved independently.

use crate::config::{ConfigError, ConfigValue, FromConfigValue};

/// What a façade does with a captured failure after the scope is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Hand the failure back to the caller as `Err`.
    #[default]
    Raise,
    /// Swallow it; the caller inspects the returned [`Completion`](crate::Completion).
    Status,
}

/// What to do when the session already has a transaction open and no scope
/// owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExistingTxnPolicy {
    /// Refuse with `AmbientTransactionConflict`.
    #[default]
    Error,
    /// Take ownership of the ambient transaction and commit/rollback it.
    Join,
    /// Work inside a savepoint; the ambient transaction is left to its owner.
    Savepoint,
    /// Like `Join`, but only for transactions the driver began on its own.
    AdoptAutobegin,
    /// Roll the ambient transaction back and begin a fresh one.
    Reset,
}

impl ErrorPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorPolicy::Raise => "raise",
            ErrorPolicy::Status => "status",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raise" => Some(ErrorPolicy::Raise),
            "status" => Some(ErrorPolicy::Status),
            _ => None,
        }
    }
}

impl ExistingTxnPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            ExistingTxnPolicy::Error => "error",
            ExistingTxnPolicy::Join => "join",
            ExistingTxnPolicy::Savepoint => "savepoint",
            ExistingTxnPolicy::AdoptAutobegin => "adopt_autobegin",
            ExistingTxnPolicy::Reset => "reset",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "error" => Some(ExistingTxnPolicy::Error),
            "join" => Some(ExistingTxnPolicy::Join),
            "savepoint" => Some(ExistingTxnPolicy::Savepoint),
            "adopt_autobegin" => Some(ExistingTxnPolicy::AdoptAutobegin),
            "reset" => Some(ExistingTxnPolicy::Reset),
            _ => None,
        }
    }
}

impl std::fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for ExistingTxnPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromConfigValue for ErrorPolicy {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        let raw = String::from_config_value(value, key)?;
        ErrorPolicy::parse(&raw).ok_or_else(|| ConfigError::TypeMismatch {
            key: key.to_string(),
            expected: "error policy (raise | status)",
        })
    }
}

impl FromConfigValue for ExistingTxnPolicy {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        let raw = String::from_config_value(value, key)?;
        ExistingTxnPolicy::parse(&raw).ok_or_else(|| ConfigError::TypeMismatch {
            key: key.to_string(),
            expected: "existing transaction policy (error | join | savepoint | adopt_autobegin | reset)",
        })
    }
}

/// One tier's partial override. Unset fields defer to the next tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolicyOverride {
    pub error_policy: Option<ErrorPolicy>,
    pub existing_txn_policy: Option<ExistingTxnPolicy>,
}

impl PolicyOverride {
    pub const NONE: PolicyOverride = PolicyOverride {
        error_policy: None,
        existing_txn_policy: None,
    };

    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = Some(policy);
        self
    }

    pub fn existing_txn_policy(mut self, policy: ExistingTxnPolicy) -> Self {
        self.existing_txn_policy = Some(policy);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.error_policy.is_none() && self.existing_txn_policy.is_none()
    }
}

/// Fully resolved policy for one scope. Immutable once computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EffectivePolicy {
    pub error_policy: ErrorPolicy,
    pub existing_txn_policy: ExistingTxnPolicy,
}

impl EffectivePolicy {
    /// Built-in default: `Raise` / `Error`.
    pub const BUILTIN: EffectivePolicy = EffectivePolicy {
        error_policy: ErrorPolicy::Raise,
        existing_txn_policy: ExistingTxnPolicy::Error,
    };

    /// Resolve each field from the first tier that sets it.
    pub fn resolve(
        call_site: &PolicyOverride,
        instance: &PolicyOverride,
        global: &PolicyOverride,
        builtin: EffectivePolicy,
    ) -> EffectivePolicy {
        let tiers = [call_site, instance, global];
        EffectivePolicy {
            error_policy: tiers
                .iter()
                .find_map(|t| t.error_policy)
                .unwrap_or(builtin.error_policy),
            existing_txn_policy: tiers
                .iter()
                .find_map(|t| t.existing_txn_policy)
                .unwrap_or(builtin.existing_txn_policy),
        }
    }
}
