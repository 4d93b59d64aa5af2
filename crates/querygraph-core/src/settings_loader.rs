//! Settings loading from configuration files.
//!
//! This module provides functions to load [`Settings`] from TOML files, JSON
//! files, and to apply environment variable overrides.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (overriding defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `QUERYGRAPH_DEBUG` | `debug` |
//! | `QUERYGRAPH_LOG_LEVEL` | `log_level` |
//! | `QUERYGRAPH_ALIAS_PREFIX` | `alias_prefix` |
//! | `QUERYGRAPH_PARAMETER_STYLE` | `parameter_style` (`positional`, `numbered`, `named`) |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use querygraph_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file_with_env("config/querygraph.toml").unwrap();
//! ```

use std::path::Path;

use crate::error::QueryError;
use crate::settings::{ParameterStyle, Settings};

/// Loads settings from a TOML string.
///
/// Any fields not present in the TOML keep their default values.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or cannot be deserialized.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, QueryError> {
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| QueryError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;
    merge_into_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, QueryError> {
    from_toml_str(&read_file(path.as_ref(), "TOML")?)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, QueryError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from a JSON string.
///
/// # Errors
///
/// Returns an error if the JSON is malformed or cannot be deserialized.
pub fn from_json_str(json_str: &str) -> Result<Settings, QueryError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| QueryError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;
    merge_into_defaults(json_value, "JSON")
}

/// Loads settings from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the JSON is malformed.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Settings, QueryError> {
    from_json_str(&read_file(path.as_ref(), "JSON")?)
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies environment variable overrides to a settings struct.
///
/// Unparseable `QUERYGRAPH_PARAMETER_STYLE` values are ignored with a warning.
pub fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(val) = std::env::var("QUERYGRAPH_DEBUG") {
        settings.debug = matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
    }

    if let Ok(val) = std::env::var("QUERYGRAPH_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Ok(val) = std::env::var("QUERYGRAPH_ALIAS_PREFIX") {
        if !val.trim().is_empty() {
            settings.alias_prefix = val.trim().to_string();
        }
    }

    if let Ok(val) = std::env::var("QUERYGRAPH_PARAMETER_STYLE") {
        match ParameterStyle::parse(&val) {
            Some(style) => settings.parameter_style = style,
            None => tracing::warn!("Ignoring unknown QUERYGRAPH_PARAMETER_STYLE '{val}'"),
        }
    }
}

// ============================================================
// Helpers
// ============================================================

fn read_file(path: &Path, format: &str) -> Result<String, QueryError> {
    std::fs::read_to_string(path).map_err(|e| {
        QueryError::ConfigurationError(format!(
            "Failed to read {format} file '{}': {e}",
            path.display()
        ))
    })
}

/// Deep-merges `overrides` over the serialized defaults and deserializes the result.
fn merge_into_defaults(overrides: serde_json::Value, format: &str) -> Result<Settings, QueryError> {
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        QueryError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;
    let merged = merge_json(default_json, overrides);
    let settings: Settings = serde_json::from_value(merged).map_err(|e| {
        QueryError::ConfigurationError(format!("Failed to deserialize settings from {format}: {e}"))
    })?;
    if settings.alias_prefix.is_empty() {
        return Err(QueryError::ConfigurationError(
            "alias_prefix must not be empty".to_string(),
        ));
    }
    Ok(settings)
}

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => serde_json::Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = if let Some(base_v) = base_map.remove(&key) {
                    merge_json(base_v, override_v)
                } else {
                    override_v
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── TOML loading ────────────────────────────────────────────────

    #[test]
    fn test_from_toml_str_basic() {
        let toml = r#"
            debug = false
            alias_prefix = "q"
            parameter_style = "named"
        "#;

        let settings = from_toml_str(toml).unwrap();
        assert!(!settings.debug);
        assert_eq!(settings.alias_prefix, "q");
        assert_eq!(settings.parameter_style, ParameterStyle::Named);
        // Defaults preserved
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_from_toml_str_extra_table() {
        let toml = r#"
            [extra]
            tenant = "acme"
        "#;
        let settings = from_toml_str(toml).unwrap();
        assert_eq!(settings.extra["tenant"], serde_json::json!("acme"));
    }

    #[test]
    fn test_from_toml_str_malformed() {
        let err = from_toml_str("debug = = true").unwrap_err();
        assert!(matches!(err, QueryError::ConfigurationError(_)));
    }

    #[test]
    fn test_from_toml_str_rejects_empty_prefix() {
        let err = from_toml_str(r#"alias_prefix = """#).unwrap_err();
        assert!(err.to_string().contains("alias_prefix"));
    }

    // ── JSON loading ────────────────────────────────────────────────

    #[test]
    fn test_from_json_str_basic() {
        let settings =
            from_json_str(r#"{"log_level": "debug", "parameter_style": "numbered"}"#).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.parameter_style, ParameterStyle::Numbered);
        assert_eq!(settings.alias_prefix, "hobj");
    }

    #[test]
    fn test_from_json_str_unknown_style() {
        let err = from_json_str(r#"{"parameter_style": "dollar"}"#).unwrap_err();
        assert!(matches!(err, QueryError::ConfigurationError(_)));
    }

    #[test]
    fn test_from_file_missing() {
        let err = from_toml_file("/nonexistent/querygraph.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read TOML file"));
    }

    // ── Environment overrides ───────────────────────────────────────

    #[test]
    fn test_env_overrides() {
        std::env::set_var("QUERYGRAPH_ALIAS_PREFIX", "alias");
        std::env::set_var("QUERYGRAPH_PARAMETER_STYLE", "named");
        let mut settings = Settings::default();
        apply_env_overrides(&mut settings);
        std::env::remove_var("QUERYGRAPH_ALIAS_PREFIX");
        std::env::remove_var("QUERYGRAPH_PARAMETER_STYLE");

        assert_eq!(settings.alias_prefix, "alias");
        assert_eq!(settings.parameter_style, ParameterStyle::Named);
    }

    // ── Helpers ─────────────────────────────────────────────────────

    #[test]
    fn test_merge_json_nested() {
        let base = serde_json::json!({"a": {"b": 1, "c": 2}, "d": 3});
        let over = serde_json::json!({"a": {"b": 10}});
        let merged = merge_json(base, over);
        assert_eq!(merged, serde_json::json!({"a": {"b": 10, "c": 2}, "d": 3}));
    }
}
