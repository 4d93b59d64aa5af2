//! Settings for querygraph.
//!
//! This module provides the [`Settings`] struct, which holds the engine
//! configuration, and [`LazySettings`], a globally-accessible, lazily-initialized
//! settings instance.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// How parameter placeholders are written into compiled query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterStyle {
    /// JDBC-style `?` placeholders.
    #[default]
    Positional,
    /// Ordinal placeholders `?1, ?2, ...`.
    Numbered,
    /// Named placeholders `:p1, :p2, ...`; user-named parameters keep their name.
    Named,
}

impl ParameterStyle {
    /// Parses a style name as used in configuration files and the environment.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "positional" => Some(Self::Positional),
            "numbered" => Some(Self::Numbered),
            "named" => Some(Self::Named),
            _ => None,
        }
    }
}

/// The complete set of engine settings.
///
/// # Examples
///
/// ```
/// use querygraph_core::settings::{ParameterStyle, Settings};
///
/// let settings = Settings::default();
/// assert_eq!(settings.alias_prefix, "hobj");
/// assert_eq!(settings.parameter_style, ParameterStyle::Positional);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Whether debug mode is enabled (pretty logs instead of JSON).
    pub debug: bool,
    /// The log level filter (e.g. "info", "querygraph_engine=trace").
    pub log_level: String,
    /// Prefix of generated aliases; the first alias is `{prefix}1`.
    pub alias_prefix: String,
    /// Placeholder style used by the compiler.
    pub parameter_style: ParameterStyle,
    /// Custom settings that don't fit into the above categories.
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            log_level: "info".to_string(),
            alias_prefix: "hobj".to_string(),
            parameter_style: ParameterStyle::Positional,
            extra: HashMap::new(),
        }
    }
}

/// A lazily-initialized, globally-accessible settings container.
///
/// Call [`configure`](LazySettings::configure) once at startup to set the
/// settings, then use [`get`](LazySettings::get) to access them.
pub struct LazySettings {
    inner: OnceLock<Settings>,
}

impl Default for LazySettings {
    fn default() -> Self {
        Self::new()
    }
}

impl LazySettings {
    /// Creates a new, unconfigured `LazySettings`.
    pub const fn new() -> Self {
        Self {
            inner: OnceLock::new(),
        }
    }

    /// Configures the global settings. Must be called exactly once.
    ///
    /// # Panics
    ///
    /// Panics if settings have already been configured.
    pub fn configure(&self, settings: Settings) {
        self.inner
            .set(settings)
            .expect("Settings have already been configured");
    }

    /// Returns the configured settings, if any.
    pub fn try_get(&self) -> Option<&Settings> {
        self.inner.get()
    }

    /// Returns a reference to the configured settings.
    ///
    /// # Panics
    ///
    /// Panics if settings have not been configured.
    pub fn get(&self) -> &Settings {
        self.inner
            .get()
            .expect("Settings have not been configured. Call SETTINGS.configure() first.")
    }

    /// Returns a copy of the configured settings, or the defaults.
    pub fn get_or_default(&self) -> Settings {
        self.try_get().cloned().unwrap_or_default()
    }

    /// Returns `true` if settings have been configured.
    pub fn is_configured(&self) -> bool {
        self.inner.get().is_some()
    }
}

/// The global settings instance.
pub static SETTINGS: LazySettings = LazySettings::new();
