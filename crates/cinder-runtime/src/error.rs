//! Runtime error types.

use cinder_core::ContainerError;
use cinder_framework::TimeoutError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    /// One or more eager services failed to build; nothing was started.
    #[error("{} eager service(s) failed to start: {}", .0.len(), failed_ids(.0))]
    EagerStartup(Vec<(String, ContainerError)>),

    /// The runtime was stopped and cannot be started again.
    #[error("Runtime has been stopped")]
    Stopped,

    #[error("Failed to listen for shutdown signals: {0}")]
    Signal(#[from] std::io::Error),
}

fn failed_ids(failures: &[(String, ContainerError)]) -> String {
    failures
        .iter()
        .map(|(id, _)| id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
