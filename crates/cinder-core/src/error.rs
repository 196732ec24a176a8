//! Error types for the service container.

use thiserror::Error;

use crate::capability::Capability;

/// Boxed error returned by service recipes and release hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors reported by [`CapabilityRegistry`](crate::CapabilityRegistry) and
/// [`ServiceContainer`](crate::ServiceContainer).
#[derive(Debug, Error)]
pub enum ContainerError {
    /// A descriptor with the same id is already registered.
    #[error("service id '{0}' is already registered")]
    DuplicateId(String),

    /// More than one active provider matches and neither a primary flag nor a
    /// unique highest priority breaks the tie.
    #[error("capability {capability} is ambiguous, candidates: {}", .candidates.join(", "))]
    Ambiguous {
        /// The requested capability.
        capability: Capability,
        /// Ids of all active providers, in registration order.
        candidates: Vec<String>,
    },

    /// No active provider matches.
    ///
    /// `rejected` lists every registered provider whose activation predicates
    /// failed, with the reason reported by the predicate.
    #[error("no active service provides {capability}{}", format_rejected(.rejected))]
    NotFound {
        /// The requested capability.
        capability: Capability,
        /// `(service id, reason)` for each provider that was filtered out.
        rejected: Vec<(String, String)>,
    },

    /// A descriptor depends, directly or transitively, on itself.
    #[error("cyclic dependency: {}", .path.join(" -> "))]
    CyclicDependency {
        /// Service ids along the cycle; the first and last entries are equal.
        path: Vec<String>,
    },

    /// The recipe of a service returned an error or panicked.
    #[error("failed to construct service '{id}': {source}")]
    Construction {
        /// Id of the service being constructed.
        id: String,
        /// The recipe's error.
        #[source]
        source: BoxError,
    },

    /// A dependency could not be resolved while constructing a service.
    #[error("failed to resolve dependency {capability} of '{id}': {source}")]
    Dependency {
        /// Id of the service being constructed.
        id: String,
        /// The dependency's capability.
        capability: Capability,
        /// The underlying resolution error.
        #[source]
        source: Box<ContainerError>,
    },

    /// A resolved instance did not expose the requested capability type.
    ///
    /// Only happens when a descriptor's capability view was declared with a
    /// mismatching type.
    #[error("service '{id}' does not expose capability {capability} as the requested type")]
    TypeMismatch {
        /// Id of the offending service.
        id: String,
        /// The requested capability.
        capability: Capability,
    },

    /// The container has been torn down and no longer hands out instances.
    #[error("service container has been torn down")]
    Closed,
}

impl ContainerError {
    /// Returns `true` if this error (or the dependency error it wraps) is a
    /// cycle.
    pub fn is_cycle(&self) -> bool {
        match self {
            Self::CyclicDependency { .. } => true,
            Self::Dependency { source, .. } => source.is_cycle(),
            _ => false,
        }
    }

    /// Returns `true` if no provider matched the requested capability.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

fn format_rejected(rejected: &[(String, String)]) -> String {
    if rejected.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = rejected
        .iter()
        .map(|(id, reason)| format!("'{id}': {reason}"))
        .collect();
    format!(" (unavailable: {})", parts.join("; "))
}

/// Result type for container operations.
pub type ContainerResult<T> = Result<T, ContainerError>;

#[cfg(test)]
mod tests {
    use super::*;

    trait Store {}

    #[test]
    fn test_not_found_message_lists_rejections() {
        let err = ContainerError::NotFound {
            capability: Capability::of::<dyn Store>(),
            rejected: vec![("dev_store".into(), "requires profile 'dev'".into())],
        };
        let msg = err.to_string();
        assert!(msg.contains("Store"));
        assert!(msg.contains("'dev_store': requires profile 'dev'"));
    }

    #[test]
    fn test_cycle_message() {
        let err = ContainerError::CyclicDependency {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "cyclic dependency: a -> b -> a");
        assert!(err.is_cycle());
    }

    #[test]
    fn test_is_cycle_through_dependency() {
        let err = ContainerError::Dependency {
            id: "x".into(),
            capability: Capability::of::<dyn Store>(),
            source: Box::new(ContainerError::CyclicDependency {
                path: vec!["a".into(), "a".into()],
            }),
        };
        assert!(err.is_cycle());
        assert!(!err.is_not_found());
    }
}
