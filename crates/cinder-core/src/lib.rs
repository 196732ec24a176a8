//! # Cinder Core
//!
//! Capability-based service container for the Cinder bot framework.
//!
//! Services are described by [`ServiceDescriptor`]s: the capabilities they
//! provide, the capabilities they depend on, the [`ActivationPredicate`]s
//! gating them and a recipe building the concrete value.  The
//! [`ServiceContainer`] resolves a capability to exactly one active provider
//! (or to all of them), builds singletons once, detects dependency cycles and
//! releases everything in reverse construction order at teardown.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cinder_core::{ActivationContext, ActivationPredicate, ServiceContainer, ServiceDescriptor};
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//! impl Greeter for English {
//!     fn greet(&self) -> String { "hello".into() }
//! }
//!
//! let container = ServiceContainer::new();
//! container.register(
//!     ServiceDescriptor::builder::<English>("english")
//!         .provides::<dyn Greeter>(|s| s)
//!         .when(ActivationPredicate::profile("dev"))
//!         .construct(|_| Ok(English)),
//! )?;
//!
//! let ctx = ActivationContext::new().with_profile("dev");
//! let greeter: Arc<dyn Greeter> = container.resolve(&ctx)?;
//! ```

pub mod capability;
pub mod container;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod feed;
pub mod instance;
pub mod predicate;
pub mod registry;

pub use capability::Capability;
pub use container::{ServiceContainer, TeardownReport};
pub use context::{ActivationContext, PROFILE_KEY};
pub use descriptor::{
    Dependencies, Dependency, DependencyKind, DescriptorBuilder, Lifecycle, ServiceArc,
    ServiceDescriptor,
};
pub use error::{BoxError, ContainerError, ContainerResult};
pub use feed::{DescriptorFactory, SERVICE_DESCRIPTORS, collect_descriptors};
pub use instance::ServiceInstance;
pub use predicate::ActivationPredicate;
pub use registry::{Availability, CapabilityRegistry};

// Re-export linkme for use by cinder-macros.
pub use linkme;
