//! Link-time descriptor feed.
//!
//! Crates contribute descriptor factories to [`SERVICE_DESCRIPTORS`], usually
//! through the `#[service]` attribute from `cinder-macros`:
//!
//! ```rust,ignore
//! #[cinder::service]
//! fn english_greeter() -> ServiceDescriptor {
//!     ServiceDescriptor::builder::<English>("english_greeter")
//!         .provides::<dyn Greeter>(|s| s)
//!         .construct(|_| Ok(English))
//! }
//! ```
//!
//! The runtime collects the feed once at start-up and registers every
//! descriptor with its container.

use linkme::distributed_slice;

use crate::container::ServiceContainer;
use crate::descriptor::ServiceDescriptor;
use crate::error::ContainerResult;

/// Factory producing one descriptor.
pub type DescriptorFactory = fn() -> ServiceDescriptor;

/// Registry of descriptor factories contributed by linked crates.
#[distributed_slice]
pub static SERVICE_DESCRIPTORS: [DescriptorFactory];

/// Builds every descriptor in the feed, in link order.
pub fn collect_descriptors() -> Vec<ServiceDescriptor> {
    SERVICE_DESCRIPTORS.iter().map(|factory| factory()).collect()
}

impl ServiceContainer {
    /// Registers every descriptor contributed to [`SERVICE_DESCRIPTORS`].
    ///
    /// Returns the number of registered descriptors.
    pub fn register_linked(&self) -> ContainerResult<usize> {
        let descriptors = collect_descriptors();
        let count = descriptors.len();
        self.register_all(descriptors)?;
        tracing::debug!(count, "Registered linked services");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ActivationContext;

    struct Linked;

    fn linked_descriptor() -> ServiceDescriptor {
        ServiceDescriptor::builder::<Linked>("core_feed_test").construct(|_| Ok(Linked))
    }

    #[distributed_slice(SERVICE_DESCRIPTORS)]
    static LINKED: DescriptorFactory = linked_descriptor;

    #[test]
    fn test_feed_contains_linked_descriptor() {
        assert!(collect_descriptors().iter().any(|d| d.id() == "core_feed_test"));
    }

    #[test]
    fn test_register_linked() {
        let container = ServiceContainer::new();
        let count = container.register_linked().unwrap();
        assert!(count >= 1);
        assert!(container.resolve::<Linked>(&ActivationContext::new()).is_ok());
    }
}
