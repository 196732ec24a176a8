//! Cinder Runtime - orchestration layer for the Cinder bot framework.
//!
//! This crate provides:
//! - Layered configuration ([`config`]): defaults, `cinder.toml`,
//!   `CINDER_*` environment variables
//! - Logging setup ([`logging`]) driven by the `[logging]` section
//! - The [`CinderRuntime`] lifecycle: linked services are registered and
//!   eager singletons built at start, the timeout scheduler runs in the
//!   background, and everything is released at shutdown
//!
//! ```ignore
//! use cinder_runtime::CinderRuntime;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = CinderRuntime::builder().profile("dev").build()?;
//!
//!     // Run until Ctrl+C
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

// Re-exports
pub use config::{CinderConfig, ConfigError, ConfigLoader, ConfigResult};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, LoggingError, LoggingGuard, SpanEvents};
pub use runtime::{CinderRuntime, RuntimeBuilder, TIMEOUT_REGISTRY_SERVICE};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Commonly used logging macros.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
