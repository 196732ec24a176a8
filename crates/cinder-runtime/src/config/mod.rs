//! Configuration for the Cinder runtime.
//!
//! Settings are layered with `figment` (defaults, files, `CINDER_*`
//! environment variables, programmatic overrides) and validated before the
//! runtime starts.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    CinderConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, ServicesConfig,
    SpanEventConfig, TimeoutsConfig,
};
pub use validation::validate_config;
