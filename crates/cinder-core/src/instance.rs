use std::fmt;
use std::sync::Arc;

use crate::capability::Capability;
use crate::descriptor::{ServiceArc, ServiceDescriptor};

/// A realized service object together with the descriptor that built it.
///
/// Cloning is cheap and shares the underlying object.
#[derive(Clone)]
pub struct ServiceInstance {
    descriptor: Arc<ServiceDescriptor>,
    object: ServiceArc,
}

impl ServiceInstance {
    pub(crate) fn new(descriptor: Arc<ServiceDescriptor>, object: ServiceArc) -> Self {
        Self { descriptor, object }
    }

    /// Id of the descriptor that built this instance.
    pub fn id(&self) -> &str {
        self.descriptor.id()
    }

    /// The descriptor that built this instance.
    pub fn descriptor(&self) -> &Arc<ServiceDescriptor> {
        &self.descriptor
    }

    /// Views the instance as capability `C`.
    ///
    /// Returns `None` if the descriptor does not provide `C`.
    pub fn get<C: ?Sized + 'static>(&self) -> Option<Arc<C>> {
        let view = self.descriptor.view(Capability::of::<C>())?;
        view(&self.object)?.downcast::<Arc<C>>().ok().map(|boxed| *boxed)
    }

    /// Returns `true` if both handles point at the same object.
    pub fn ptr_eq(&self, other: &ServiceInstance) -> bool {
        Arc::ptr_eq(&self.object, &other.object)
    }

    pub(crate) fn object(&self) -> &ServiceArc {
        &self.object
    }
}

impl fmt::Debug for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceInstance")
            .field("id", &self.descriptor.id())
            .field("type_name", &self.descriptor.type_name())
            .finish()
    }
}
