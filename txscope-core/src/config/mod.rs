mod loader;
pub mod value;

use std::collections::HashMap;
use std::path::Path;

pub use value::{ConfigValue, FromConfigValue};

use crate::policy::{ErrorPolicy, ExistingTxnPolicy, PolicyOverride};

pub const ERROR_POLICY_KEY: &str = "txscope.error_policy";
pub const EXISTING_TXN_POLICY_KEY: &str = "txscope.existing_txn_policy";

/// Error type for configuration operations.
#[derive(Debug)]
pub enum ConfigError {
    /// The requested key was not found in the configuration.
    NotFound(String),
    /// The value could not be converted to the requested type.
    TypeMismatch { key: String, expected: &'static str },
    /// An I/O or YAML parsing error occurred while loading config files.
    Load(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(key) => write!(f, "Config key not found: {key}"),
            ConfigError::TypeMismatch { key, expected } => {
                write!(f, "Config type mismatch for '{key}': expected {expected}")
            }
            ConfigError::Load(msg) => write!(f, "Config load error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Process-wide policy defaults loaded from YAML files, `.env` files and
/// environment variables.
///
/// Resolution order (lowest to highest priority):
/// 1. `txscope.yaml`
/// 2. `txscope-{profile}.yaml`
/// 3. `.env` and `.env.{profile}` (loaded into the process environment)
/// 4. `TXSCOPE_*` environment variables (`TXSCOPE_ERROR_POLICY` overrides
///    `txscope.error_policy`)
///
/// The profile is `TXSCOPE_PROFILE` if set, otherwise the argument.
#[derive(Debug, Clone)]
pub struct TxConfig {
    values: HashMap<String, ConfigValue>,
    profile: String,
}

impl TxConfig {
    /// Load from the current working directory.
    pub fn load(profile: &str) -> Result<Self, ConfigError> {
        Self::load_from(Path::new("."), profile)
    }

    /// Load with YAML files looked up in `dir`.
    pub fn load_from(dir: &Path, profile: &str) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let active_profile =
            std::env::var("TXSCOPE_PROFILE").unwrap_or_else(|_| profile.to_string());
        let _ = dotenvy::from_filename(format!(".env.{active_profile}"));

        let mut values = HashMap::new();
        loader::load_yaml_file(&dir.join("txscope.yaml"), &mut values)?;
        loader::load_yaml_file(&dir.join(format!("txscope-{active_profile}.yaml")), &mut values)?;
        loader::overlay_env(std::env::vars(), &mut values);

        tracing::debug!(profile = %active_profile, keys = values.len(), "loaded transaction config");
        Ok(TxConfig {
            values,
            profile: active_profile,
        })
    }

    /// Build from a YAML string; no files or environment are consulted.
    pub fn from_yaml_str(yaml: &str, profile: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        loader::load_yaml_str(yaml, &mut values)?;
        Ok(TxConfig {
            values,
            profile: profile.to_string(),
        })
    }

    pub fn empty() -> Self {
        TxConfig {
            values: HashMap::new(),
            profile: "test".to_string(),
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<ConfigValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn get<V: FromConfigValue>(&self, key: &str) -> Result<V, ConfigError> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))?;
        V::from_config_value(value, key)
    }

    pub fn get_or<V: FromConfigValue>(&self, key: &str, default: V) -> V {
        self.get(key).unwrap_or(default)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// The process-wide policy tier described by this config.
    ///
    /// Missing keys leave the field unset; present but unparseable values
    /// are an error.
    pub fn policy_override(&self) -> Result<PolicyOverride, ConfigError> {
        Ok(PolicyOverride {
            error_policy: self.optional::<ErrorPolicy>(ERROR_POLICY_KEY)?,
            existing_txn_policy: self.optional::<ExistingTxnPolicy>(EXISTING_TXN_POLICY_KEY)?,
        })
    }

    fn optional<V: FromConfigValue>(&self, key: &str) -> Result<Option<V>, ConfigError> {
        match self.values.get(key) {
            None | Some(ConfigValue::Null) => Ok(None),
            Some(value) => V::from_config_value(value, key).map(Some),
        }
    }
}
