//! Error types for the Cinder framework.

use std::time::Duration;

use cinder_core::{Capability, ContainerError};
use thiserror::Error;

use crate::timeout::Token;

/// Errors returned by [`TimeoutRegistry`](crate::TimeoutRegistry) operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TimeoutError {
    /// A handler with the same token is still pending.
    #[error("timeout token '{0}' is already pending")]
    DuplicateToken(Token),

    /// The deadline lies further in the future than the registry allows.
    #[error("deadline for '{token}' is {requested:?} away, maximum is {max:?}")]
    DeadlineTooFar {
        /// The offending token.
        token: Token,
        /// Distance between now and the requested deadline.
        requested: Duration,
        /// Configured maximum.
        max: Duration,
    },
}

/// Result type for timeout registry operations.
pub type TimeoutResult<T> = Result<T, TimeoutError>;

/// Errors raised while building a command option.
#[derive(Debug, Error)]
pub enum OptionError {
    /// A capability the option requires has no usable provider.
    #[error("option '{option}' requires {capability}: {source}")]
    UnsatisfiedOptionDependency {
        /// Declared name of the option.
        option: String,
        /// The missing capability.
        capability: Capability,
        /// Why resolution failed.
        #[source]
        source: ContainerError,
    },

    /// The option description is invalid.
    #[error("option '{option}' is invalid: {reason}")]
    Invalid {
        /// Declared name of the option.
        option: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl OptionError {
    /// Creates an [`OptionError::Invalid`].
    pub fn invalid(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            option: option.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for option building.
pub type OptionResult<T> = Result<T, OptionError>;
