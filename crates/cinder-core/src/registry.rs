//! Capability registry: descriptors indexed by the capabilities they provide.
//!
//! The registry only stores metadata.  Lookups filter candidates through
//! their activation predicates; instance construction and caching live in
//! [`ServiceContainer`](crate::ServiceContainer).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::capability::Capability;
use crate::context::ActivationContext;
use crate::descriptor::ServiceDescriptor;
use crate::error::{ContainerError, ContainerResult};

/// Availability of one registered provider under a given context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Availability {
    /// Id of the provider.
    pub id: String,
    /// `Ok(())` when active, `Err(reason)` naming the first failing predicate.
    pub status: Result<(), String>,
}

impl Availability {
    /// Returns `true` when the provider is active.
    pub fn is_active(&self) -> bool {
        self.status.is_ok()
    }
}

#[derive(Default)]
struct RegistryInner {
    descriptors: Vec<Arc<ServiceDescriptor>>,
    ids: HashMap<Arc<str>, usize>,
    by_capability: HashMap<Capability, Vec<usize>>,
}

/// Maps capabilities to the descriptors that provide them.
///
/// Safe for concurrent lookups and registration.  Registration order is
/// preserved and used as the ordering of [`find`](Self::find).
#[derive(Default)]
pub struct CapabilityRegistry {
    inner: RwLock<RegistryInner>,
}

impl CapabilityRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a descriptor.
    ///
    /// Fails with [`ContainerError::DuplicateId`] if the id is taken; the
    /// registry is left unchanged in that case.
    pub fn register(&self, descriptor: ServiceDescriptor) -> ContainerResult<Arc<ServiceDescriptor>> {
        let descriptor = Arc::new(descriptor);
        let mut inner = self.inner.write();

        if inner.ids.contains_key(descriptor.id()) {
            return Err(ContainerError::DuplicateId(descriptor.id().to_string()));
        }

        let index = inner.descriptors.len();
        inner.ids.insert(descriptor.shared_id(), index);
        for capability in descriptor.capabilities() {
            inner.by_capability.entry(capability).or_default().push(index);
        }
        inner.descriptors.push(Arc::clone(&descriptor));

        debug!(
            service = descriptor.id(),
            type_name = descriptor.type_name(),
            lifecycle = ?descriptor.lifecycle(),
            "Registered service"
        );
        Ok(descriptor)
    }

    /// Looks a descriptor up by id.
    pub fn get(&self, id: &str) -> Option<Arc<ServiceDescriptor>> {
        let inner = self.inner.read();
        inner.ids.get(id).map(|&i| Arc::clone(&inner.descriptors[i]))
    }

    /// All registered descriptors, in registration order.
    pub fn descriptors(&self) -> Vec<Arc<ServiceDescriptor>> {
        self.inner.read().descriptors.clone()
    }

    /// Number of registered descriptors.
    pub fn len(&self) -> usize {
        self.inner.read().descriptors.len()
    }

    /// Returns `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every provider of `capability`, active or not, in registration order.
    fn candidates(&self, capability: Capability) -> Vec<Arc<ServiceDescriptor>> {
        let inner = self.inner.read();
        inner
            .by_capability
            .get(&capability)
            .map(|indices| {
                indices
                    .iter()
                    .map(|&i| Arc::clone(&inner.descriptors[i]))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Active providers of `capability`, in registration order.
    ///
    /// Predicates run outside the registry lock.
    pub fn find(&self, capability: Capability, ctx: &ActivationContext) -> Vec<Arc<ServiceDescriptor>> {
        self.candidates(capability)
            .into_iter()
            .filter(|d| d.availability(ctx).is_ok())
            .collect()
    }

    /// The single active provider of `capability`.
    ///
    /// With several active providers, a single primary provider wins;
    /// otherwise a unique highest priority wins; otherwise the lookup is
    /// [`Ambiguous`](ContainerError::Ambiguous).
    pub fn find_one(
        &self,
        capability: Capability,
        ctx: &ActivationContext,
    ) -> ContainerResult<Arc<ServiceDescriptor>> {
        let mut active = Vec::new();
        let mut rejected = Vec::new();
        for descriptor in self.candidates(capability) {
            match descriptor.availability(ctx) {
                Ok(()) => active.push(descriptor),
                Err(reason) => {
                    trace!(service = descriptor.id(), %capability, %reason, "Provider inactive");
                    rejected.push((descriptor.id().to_string(), reason));
                }
            }
        }

        match active.len() {
            0 => Err(ContainerError::NotFound { capability, rejected }),
            1 => Ok(active.remove(0)),
            _ => select_one(capability, active),
        }
    }

    /// Availability of every provider of `capability` under `ctx`.
    pub fn explain(&self, capability: Capability, ctx: &ActivationContext) -> Vec<Availability> {
        self.candidates(capability)
            .into_iter()
            .map(|d| Availability {
                id: d.id().to_string(),
                status: d.availability(ctx),
            })
            .collect()
    }
}

fn select_one(
    capability: Capability,
    active: Vec<Arc<ServiceDescriptor>>,
) -> ContainerResult<Arc<ServiceDescriptor>> {
    let ambiguous = |active: &[Arc<ServiceDescriptor>]| ContainerError::Ambiguous {
        capability,
        candidates: active.iter().map(|d| d.id().to_string()).collect(),
    };

    let mut primaries = active.iter().filter(|d| d.is_primary());
    match (primaries.next(), primaries.next()) {
        (Some(primary), None) => return Ok(Arc::clone(primary)),
        (Some(_), Some(_)) => return Err(ambiguous(&active)),
        (None, _) => {}
    }

    let Some(top) = active.iter().map(|d| d.priority()).max() else {
        return Err(ambiguous(&active));
    };
    let mut best = active.iter().filter(|d| d.priority() == top);
    match (best.next(), best.next()) {
        (Some(winner), None) => Ok(Arc::clone(winner)),
        _ => Err(ambiguous(&active)),
    }
}
