use std::collections::HashMap;
use std::path::Path;

use super::value::ConfigValue;
use super::ConfigError;

/// Read a YAML file into `values`. A missing file is not an error.
pub(crate) fn load_yaml_file(
    path: &Path,
    values: &mut HashMap<String, ConfigValue>,
) -> Result<(), ConfigError> {
    if !path.exists() {
        return Ok(());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
    load_yaml_str(&content, values)
}

pub(crate) fn load_yaml_str(
    content: &str,
    values: &mut HashMap<String, ConfigValue>,
) -> Result<(), ConfigError> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| ConfigError::Load(e.to_string()))?;
    flatten_yaml("", &yaml, values);
    Ok(())
}

/// Flatten nested mappings into dot-separated keys: `txscope: {error_policy: x}`
/// becomes `txscope.error_policy`.
fn flatten_yaml(prefix: &str, value: &serde_yaml::Value, out: &mut HashMap<String, ConfigValue>) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (k, v) in map {
                let key = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    other => format!("{other:?}"),
                };
                let full_key = if prefix.is_empty() {
                    key
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_yaml(&full_key, v, out);
            }
        }
        leaf if !prefix.is_empty() => {
            out.insert(prefix.to_string(), ConfigValue::from_yaml(leaf));
        }
        _ => {}
    }
}

/// Overlay `TXSCOPE_*` environment variables.
///
/// `TXSCOPE_ERROR_POLICY` maps to `txscope.error_policy`: the prefix is
/// split off at the first underscore, the rest is kept as one key segment.
pub(crate) fn overlay_env(
    vars: impl Iterator<Item = (String, String)>,
    values: &mut HashMap<String, ConfigValue>,
) {
    for (env_key, env_val) in vars {
        let lower = env_key.to_ascii_lowercase();
        if let Some(rest) = lower.strip_prefix("txscope_") {
            if rest.is_empty() || rest == "profile" {
                continue;
            }
            values.insert(format!("txscope.{rest}"), ConfigValue::String(env_val));
        }
    }
}
