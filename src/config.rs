//! Flat settings surface with typed optional lookups.
//!
//! Jobs hand the sink a string-keyed map (built programmatically or loaded
//! from a flat YAML file with `${VAR}` environment substitution). Every
//! lookup is typed: an absent key yields the documented default, a
//! present-but-malformed value is a fatal configuration error.

use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Context;
use regex::Regex;

use crate::errors::SinkError;

/// Setting key constants.
pub mod keys {
    pub const ENDPOINT: &str = "endpoint";
    pub const CREDENTIAL: &str = "credential";
    pub const DATABASE: &str = "database";
    pub const COLLECTION: &str = "collection";
    pub const CONNECTION_MODE: &str = "connection_mode";
    pub const MAX_POOL_SIZE: &str = "max_pool_size";
    pub const REQUEST_TIMEOUT_MS: &str = "request_timeout_ms";
    pub const IDLE_TIMEOUT_MS: &str = "idle_timeout_ms";
    pub const PREFERRED_REGIONS: &str = "preferred_regions";
    pub const CONSISTENCY_LEVEL: &str = "consistency_level";
    pub const RETRY_MAX_ATTEMPTS: &str = "retry_max_attempts";
    pub const RETRY_MAX_WAIT_MS: &str = "retry_max_wait_ms";
    pub const WRITE_BATCH_SIZE: &str = "write_batch_size";
    pub const WRITE_BATCH_DELAY_MS: &str = "write_batch_delay_ms";
    pub const ROOT_FIELD: &str = "root_field";
    pub const UPSERT: &str = "upsert";
}

pub const DEFAULT_WRITE_BATCH_SIZE: usize = 500;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// Substitute `${VAR_NAME}` patterns with environment variable values.
///
/// All missing variables are collected and reported in one error.
pub fn substitute_env_vars(input: &str) -> Result<String, SinkError> {
    let mut result = input.to_string();
    let mut missing = Vec::new();

    for cap in ENV_VAR_RE.captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(val) => {
                result = result.replace(&cap[0], &val);
            }
            Err(_) => {
                missing.push(var_name.to_string());
            }
        }
    }

    if !missing.is_empty() {
        return Err(SinkError::config(
            "MISSING_ENV_VAR",
            format!("Missing environment variable(s): {}", missing.join(", ")),
        ));
    }

    Ok(result)
}

fn missing_code(key: &str) -> String {
    format!("MISSING_{}", key.to_ascii_uppercase())
}

fn invalid_code(key: &str) -> String {
    format!("INVALID_{}", key.to_ascii_uppercase())
}

/// String-keyed settings map consumed by the transport builder and the
/// write pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    values: HashMap<String, String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key, replacing any previous value. Builder-style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Raw string lookup. Whitespace-only values count as absent.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Typed optional lookup: absent key is `Ok(None)`, malformed value is
    /// a configuration error naming the key and the offending value.
    pub fn get<T>(&self, key: &str) -> Result<Option<T>, SinkError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get_str(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
                SinkError::config(
                    invalid_code(key),
                    format!("Invalid value '{raw}' for '{key}': {e}"),
                )
            }),
        }
    }

    /// Required lookup: absence (or a blank value) is a fatal
    /// configuration error.
    pub fn require(&self, key: &str) -> Result<&str, SinkError> {
        self.get_str(key)
            .ok_or_else(|| SinkError::config(missing_code(key), format!("'{key}' is required")))
    }

    /// Parse a flat YAML mapping of scalars (after `${VAR}` substitution).
    pub fn from_yaml_str(yaml_str: &str) -> Result<Self, SinkError> {
        let substituted = substitute_env_vars(yaml_str)?;
        let raw: HashMap<String, serde_yaml::Value> = serde_yaml::from_str(&substituted)
            .map_err(|e| {
                SinkError::config("INVALID_SETTINGS_YAML", format!("Failed to parse settings YAML: {e}"))
            })?;

        let mut settings = Settings::new();
        for (key, value) in raw {
            let text = match value {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Bool(b) => b.to_string(),
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Null => continue,
                other => {
                    return Err(SinkError::config(
                        invalid_code(&key),
                        format!("Setting '{key}' must be a scalar, got: {other:?}"),
                    ))
                }
            };
            settings.set(key, text);
        }
        Ok(settings)
    }

    /// Load settings from a flat YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, SinkError> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))
            .map_err(|e| SinkError::config("SETTINGS_FILE_UNREADABLE", format!("{e:#}")))?;
        Self::from_yaml_str(&content)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Settings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Per-import knobs of the write pipeline, resolved from [`Settings`].
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOptions {
    /// Upper bound on concurrently in-flight write operations.
    pub batch_size: usize,
    /// Pause inserted after each full-size batch flush.
    pub inter_batch_delay: Duration,
    /// Row field whose string content is the whole document body.
    pub root_field: Option<String>,
    /// Create-or-replace instead of create.
    pub upsert: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_WRITE_BATCH_SIZE,
            inter_batch_delay: Duration::ZERO,
            root_field: None,
            upsert: false,
        }
    }
}

impl WriteOptions {
    pub fn from_settings(settings: &Settings) -> Result<Self, SinkError> {
        let options = Self {
            batch_size: settings
                .get::<usize>(keys::WRITE_BATCH_SIZE)?
                .unwrap_or(DEFAULT_WRITE_BATCH_SIZE),
            inter_batch_delay: settings
                .get::<u64>(keys::WRITE_BATCH_DELAY_MS)?
                .map(Duration::from_millis)
                .unwrap_or(Duration::ZERO),
            root_field: settings.get_str(keys::ROOT_FIELD).map(str::to_owned),
            upsert: settings.get::<bool>(keys::UPSERT)?.unwrap_or(false),
        };
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), SinkError> {
        if self.batch_size == 0 {
            return Err(SinkError::config(
                "INVALID_WRITE_BATCH_SIZE",
                "write_batch_size must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("DS_TEST_ENDPOINT", "https://db.example.com:443/");
        let input = "endpoint: ${DS_TEST_ENDPOINT}\ndatabase: analytics";
        let result = substitute_env_vars(input).unwrap();
        assert!(result.contains("https://db.example.com:443/"));
        assert!(!result.contains("${DS_TEST_ENDPOINT}"));
        std::env::remove_var("DS_TEST_ENDPOINT");
    }

    #[test]
    fn test_multiple_missing_env_vars_all_reported() {
        let input = "${DS_MISSING_X} and ${DS_MISSING_Y}";
        let err = substitute_env_vars(input).unwrap_err();
        assert_eq!(err.code, "MISSING_ENV_VAR");
        assert!(err.message.contains("DS_MISSING_X"));
        assert!(err.message.contains("DS_MISSING_Y"));
    }

    #[test]
    fn test_no_env_vars_passthrough() {
        let input = "endpoint: https://localhost:8081";
        assert_eq!(substitute_env_vars(input).unwrap(), input);
    }

    #[test]
    fn test_typed_lookup_absent_is_none() {
        let settings = Settings::new();
        assert_eq!(settings.get::<usize>(keys::MAX_POOL_SIZE).unwrap(), None);
    }

    #[test]
    fn test_typed_lookup_parses() {
        let settings = Settings::new().with(keys::MAX_POOL_SIZE, "64");
        assert_eq!(settings.get::<usize>(keys::MAX_POOL_SIZE).unwrap(), Some(64));
    }

    #[test]
    fn test_typed_lookup_malformed_is_config_error() {
        let settings = Settings::new().with(keys::MAX_POOL_SIZE, "lots");
        let err = settings.get::<usize>(keys::MAX_POOL_SIZE).unwrap_err();
        assert_eq!(err.code, "INVALID_MAX_POOL_SIZE");
        assert!(err.message.contains("lots"));
    }

    #[test]
    fn test_require_missing() {
        let settings = Settings::new();
        let err = settings.require(keys::ENDPOINT).unwrap_err();
        assert_eq!(err.code, "MISSING_ENDPOINT");
    }

    #[test]
    fn test_require_blank_counts_as_missing() {
        let settings = Settings::new().with(keys::CREDENTIAL, "   ");
        let err = settings.require(keys::CREDENTIAL).unwrap_err();
        assert_eq!(err.code, "MISSING_CREDENTIAL");
    }

    #[test]
    fn test_from_yaml_str_scalars() {
        let yaml = r#"
endpoint: https://db.example.com:443/
max_pool_size: 100
upsert: true
root_field:
"#;
        let settings = Settings::from_yaml_str(yaml).unwrap();
        assert_eq!(
            settings.get_str(keys::ENDPOINT),
            Some("https://db.example.com:443/")
        );
        assert_eq!(settings.get::<usize>(keys::MAX_POOL_SIZE).unwrap(), Some(100));
        assert_eq!(settings.get::<bool>(keys::UPSERT).unwrap(), Some(true));
        // Null values are treated as absent.
        assert_eq!(settings.get_str(keys::ROOT_FIELD), None);
    }

    #[test]
    fn test_from_yaml_str_rejects_nested_values() {
        let yaml = "endpoint:\n  nested: true";
        let err = Settings::from_yaml_str(yaml).unwrap_err();
        assert_eq!(err.code, "INVALID_ENDPOINT");
    }

    #[test]
    fn test_from_yaml_file_not_found() {
        let err = Settings::from_yaml_file(Path::new("/nonexistent/settings.yaml")).unwrap_err();
        assert_eq!(err.code, "SETTINGS_FILE_UNREADABLE");
        assert!(err.message.contains("Failed to read settings file"));
    }

    #[test]
    fn test_write_options_defaults() {
        let options = WriteOptions::from_settings(&Settings::new()).unwrap();
        assert_eq!(options.batch_size, DEFAULT_WRITE_BATCH_SIZE);
        assert_eq!(options.inter_batch_delay, Duration::ZERO);
        assert_eq!(options.root_field, None);
        assert!(!options.upsert);
    }

    #[test]
    fn test_write_options_resolved() {
        let settings = Settings::new()
            .with(keys::WRITE_BATCH_SIZE, "25")
            .with(keys::WRITE_BATCH_DELAY_MS, "150")
            .with(keys::ROOT_FIELD, "payload")
            .with(keys::UPSERT, "true");
        let options = WriteOptions::from_settings(&settings).unwrap();
        assert_eq!(options.batch_size, 25);
        assert_eq!(options.inter_batch_delay, Duration::from_millis(150));
        assert_eq!(options.root_field.as_deref(), Some("payload"));
        assert!(options.upsert);
    }

    #[test]
    fn test_write_options_zero_batch_size_rejected() {
        let settings = Settings::new().with(keys::WRITE_BATCH_SIZE, "0");
        let err = WriteOptions::from_settings(&settings).unwrap_err();
        assert_eq!(err.code, "INVALID_WRITE_BATCH_SIZE");
    }
}
