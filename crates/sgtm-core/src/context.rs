//! Layered deployment context.
//!
//! Context values are plain strings keyed by camelCase names. Layers are
//! applied lowest precedence first:
//!
//! ```text
//! sgtm.toml [context]  <  SGTM_* environment  <  --context key=value
//! ```

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};

/// Prefix for environment variables that feed the context.
pub const ENV_PREFIX: &str = "SGTM_";

/// Context keys understood by [`StackSettings::resolve`](crate::StackSettings::resolve).
pub const CONTEXT_KEYS: &[&str] = &[
    "cpu",
    "mem",
    "desiredNodeCount",
    "taskMaxCapacity",
    "taskMinCapacity",
    "targetCpuUtilization",
    "natGateways",
    "containerConfig",
    "certificateArn",
    "domain",
    "hostedZoneId",
    "hostedZoneName",
    "previewServer",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    values: BTreeMap<String, String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from the `[context]` table of a stack file.
    ///
    /// Only scalar values are accepted; they are stringified.
    pub fn from_table(table: &BTreeMap<String, toml::Value>) -> ConfigResult<Self> {
        let mut context = Self::new();
        for (key, value) in table {
            let value = match value {
                toml::Value::String(s) => s.clone(),
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                toml::Value::Datetime(d) => d.to_string(),
                toml::Value::Array(_) | toml::Value::Table(_) => {
                    return Err(ConfigError::InvalidValue {
                        key: key.clone(),
                        value: value.to_string(),
                        reason: "expected a scalar".to_string(),
                    });
                }
            };
            context.set(key, value);
        }
        Ok(context)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Look up a key. Empty values count as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Overlay `SGTM_*` variables from `vars` for every known key.
    ///
    /// Variables are passed in explicitly so callers decide whether the
    /// process environment is consulted.
    pub fn apply_env<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in vars {
            let name = name.as_ref();
            if !name.starts_with(ENV_PREFIX) {
                continue;
            }
            match CONTEXT_KEYS.iter().find(|key| env_var_name(key) == name) {
                Some(key) => {
                    debug!(key, var = name, "context from environment");
                    self.set(*key, value);
                }
                None => debug!(var = name, "ignoring unrecognized environment variable"),
            }
        }
    }

    /// Overlay `key=value` pairs, typically from the command line.
    pub fn apply_overrides<I, S>(&mut self, pairs: I) -> ConfigResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pair in pairs {
            let (key, value) = parse_override(pair.as_ref())?;
            self.set(key, value);
        }
        Ok(())
    }

    /// Keys present in this context that nothing reads.
    pub fn unknown_keys(&self) -> Vec<&str> {
        self.keys().filter(|key| !CONTEXT_KEYS.contains(key)).collect()
    }

    pub fn warn_unknown(&self) {
        for key in self.unknown_keys() {
            warn!(key, "unknown context key");
        }
    }
}

/// Split a `key=value` override. The value may itself contain `=`.
pub fn parse_override(pair: &str) -> ConfigResult<(String, String)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(ConfigError::MalformedOverride(pair.to_string())),
    }
}

/// Environment variable carrying `key`: `desiredNodeCount` → `SGTM_DESIRED_NODE_COUNT`.
pub fn env_var_name(key: &str) -> String {
    let mut name = String::from(ENV_PREFIX);
    for (i, c) in key.chars().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            name.push('_');
        }
        name.push(c.to_ascii_uppercase());
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_names_are_screaming_snake() {
        assert_eq!(env_var_name("cpu"), "SGTM_CPU");
        assert_eq!(env_var_name("desiredNodeCount"), "SGTM_DESIRED_NODE_COUNT");
        assert_eq!(env_var_name("containerConfig"), "SGTM_CONTAINER_CONFIG");
    }

    #[test]
    fn from_table_stringifies_scalars() {
        let table: BTreeMap<String, toml::Value> = toml::from_str(
            r#"
cpu = 512
containerConfig = "abc"
previewServer = false
"#,
        )
        .unwrap();
        let context = Context::from_table(&table).unwrap();
        assert_eq!(context.get("cpu"), Some("512"));
        assert_eq!(context.get("containerConfig"), Some("abc"));
        assert_eq!(context.get("previewServer"), Some("false"));
    }

    #[test]
    fn from_table_rejects_arrays() {
        let table: BTreeMap<String, toml::Value> = toml::from_str("cpu = [1, 2]").unwrap();
        let err = Context::from_table(&table).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "cpu"));
    }

    #[test]
    fn layers_apply_in_precedence_order() {
        let mut context = Context::new();
        context.set("cpu", "256");
        context.set("mem", "512");

        context.apply_env([("SGTM_CPU", "512"), ("SGTM_MEM", "1024"), ("HOME", "/root")]);
        assert_eq!(context.get("cpu"), Some("512"));

        context.apply_overrides(["mem=2048"]).unwrap();
        assert_eq!(context.get("cpu"), Some("512"));
        assert_eq!(context.get("mem"), Some("2048"));
        assert!(context.get("HOME").is_none());
    }

    #[test]
    fn unrecognized_env_vars_are_ignored() {
        let mut context = Context::new();
        context.apply_env([("SGTM_SOMETHING_ELSE", "x")]);
        assert_eq!(context.keys().count(), 0);
    }

    #[test]
    fn override_value_may_contain_equals() {
        let (key, value) = parse_override("containerConfig=aWQ9R1RNLTEyMw==").unwrap();
        assert_eq!(key, "containerConfig");
        assert_eq!(value, "aWQ9R1RNLTEyMw==");
    }

    #[test]
    fn malformed_override_is_rejected() {
        assert!(matches!(
            parse_override("cpu"),
            Err(ConfigError::MalformedOverride(_))
        ));
        assert!(matches!(
            parse_override("=512"),
            Err(ConfigError::MalformedOverride(_))
        ));
    }

    #[test]
    fn empty_values_count_as_absent() {
        let mut context = Context::new();
        context.set("domain", "");
        assert!(context.get("domain").is_none());
    }

    #[test]
    fn unknown_keys_are_reported() {
        let mut context = Context::new();
        context.set("cpu", "256");
        context.set("colour", "blue");
        assert_eq!(context.unknown_keys(), vec!["colour"]);
    }
}
