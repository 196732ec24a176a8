//! Configuration schema definitions.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use cinder_core::ActivationContext;
use serde::{Deserialize, Serialize};

/// Root configuration structure.
///
/// ```toml
/// [logging]
/// level = "debug"
///
/// [services]
/// profile = "dev"
/// debug = true
/// properties = { "feature.search" = true }
///
/// [timeouts]
/// default_timeout_ms = 900000
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CinderConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub services: ServicesConfig,

    #[serde(default)]
    pub timeouts: TimeoutsConfig,
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to `full` without it.
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// How often the log file rolls over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Minutely,
    Hourly,
    Daily,
    #[default]
    Never,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, used when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    /// Rotated files kept on disk; `0` keeps all of them.
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line in each record.
    #[serde(default)]
    pub file_location: bool,

    /// Per-target levels, e.g. `cinder_core = "debug"`.
    #[serde(default)]
    pub filters: BTreeMap<String, LogLevel>,

    #[serde(default)]
    pub span_events: SpanEventConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file_path: None,
            rotation: LogRotation::default(),
            max_files: default_max_files(),
            thread_ids: false,
            file_location: false,
            filters: BTreeMap::new(),
            span_events: SpanEventConfig::default(),
        }
    }
}

fn default_max_files() -> usize {
    5
}

// =============================================================================
// Services
// =============================================================================

/// Settings feeding the service container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServicesConfig {
    /// Active profile evaluated by `ActivationPredicate::profile`.
    #[serde(default)]
    pub profile: Option<String>,

    /// Log every service creation with its timing at `info`.
    #[serde(default)]
    pub debug: bool,

    /// Properties evaluated by activation predicates.
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
}

impl ServicesConfig {
    /// Builds the activation context services are resolved under.
    ///
    /// A `profile` key in `properties` is overridden by [`profile`](Self::profile)
    /// when both are set.
    pub fn activation_context(&self) -> ActivationContext {
        let ctx = ActivationContext::from_map(self.properties.clone());
        match &self.profile {
            Some(profile) => ctx.with_profile(profile.clone()),
            None => ctx,
        }
    }
}

// =============================================================================
// Timeouts
// =============================================================================

/// Ephemeral handler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// Lifetime of a handler registered without an explicit deadline.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Farthest deadline a handler may ask for.
    #[serde(default = "default_max_timeout_ms")]
    pub max_timeout_ms: u64,

    /// Drop pending handlers without firing them on shutdown.
    #[serde(default = "default_clear_on_shutdown")]
    pub clear_on_shutdown: bool,
}

impl TimeoutsConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn max_timeout(&self) -> Duration {
        Duration::from_millis(self.max_timeout_ms)
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            max_timeout_ms: default_max_timeout_ms(),
            clear_on_shutdown: default_clear_on_shutdown(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    15 * 60 * 1000
}

fn default_max_timeout_ms() -> u64 {
    24 * 60 * 60 * 1000
}

fn default_clear_on_shutdown() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = CinderConfig::default();
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.logging.max_files, 5);
        assert_eq!(config.timeouts.default_timeout(), Duration::from_secs(900));
        assert_eq!(config.timeouts.max_timeout(), Duration::from_secs(86_400));
        assert!(config.timeouts.clear_on_shutdown);
        assert!(!config.services.debug);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: CinderConfig = serde_json::from_value(json!({
            "logging": { "level": "debug", "filters": { "cinder_core": "trace" } },
            "services": { "profile": "dev", "properties": { "search.enabled": true } },
            "timeouts": { "default_timeout_ms": 1000 }
        }))
        .unwrap();

        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.filters["cinder_core"], LogLevel::Trace);
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert_eq!(config.timeouts.default_timeout_ms, 1000);
        assert_eq!(config.timeouts.max_timeout_ms, 86_400_000);
    }

    #[test]
    fn test_activation_context() {
        let mut services = ServicesConfig {
            profile: Some("prod".to_string()),
            ..Default::default()
        };
        services
            .properties
            .insert("profile".to_string(), json!("dev"));
        services.properties.insert("region".to_string(), json!("eu"));

        let ctx = services.activation_context();
        assert_eq!(ctx.profile(), Some("prod"));
        assert_eq!(ctx.get("region"), Some(&json!("eu")));

        services.profile = None;
        assert_eq!(services.activation_context().profile(), Some("dev"));
    }

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Warn.to_string(), "warn");
        assert_eq!(LogLevel::Trace.to_tracing_level(), tracing::Level::TRACE);
    }
}
