//! Service container: resolution, singleton caching and teardown.
//!
//! # Concurrency
//!
//! Every singleton descriptor owns a slot guarded by its own mutex.  The
//! container resolves a descriptor's declared dependencies *before* taking
//! its slot lock, then re-checks the slot and runs the recipe while holding
//! the lock.  Recipes only see their pre-resolved [`Dependencies`], so no
//! thread ever waits on a slot while holding another, and each singleton's
//! recipe runs at most once even under concurrent first resolution.
//!
//! # Cycles
//!
//! Each resolution call tracks the chain of descriptors it is building.
//! Re-entering a descriptor already on the chain fails with
//! [`ContainerError::CyclicDependency`] carrying the full path.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::capability::Capability;
use crate::context::ActivationContext;
use crate::descriptor::{Dependencies, DependencyKind, Lifecycle, ServiceDescriptor};
use crate::error::{ContainerError, ContainerResult};
use crate::instance::ServiceInstance;
use crate::registry::{Availability, CapabilityRegistry};

type Slot = Arc<Mutex<Option<ServiceInstance>>>;

/// Outcome of [`ServiceContainer::teardown`].
#[derive(Debug, Default)]
pub struct TeardownReport {
    /// Ids of released singletons, in release order.
    pub released: Vec<String>,
    /// `(id, message)` for every release hook that failed or panicked.
    pub failures: Vec<(String, String)>,
}

impl TeardownReport {
    /// Returns `true` when every release hook succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Chain of descriptor ids currently being built by one resolution call.
#[derive(Default)]
struct ResolutionStack {
    chain: Vec<Arc<str>>,
}

impl ResolutionStack {
    fn enter(&mut self, id: Arc<str>) -> ContainerResult<()> {
        if let Some(pos) = self.chain.iter().position(|c| *c == id) {
            let mut path: Vec<String> = self.chain[pos..].iter().map(|c| c.to_string()).collect();
            path.push(id.to_string());
            return Err(ContainerError::CyclicDependency { path });
        }
        self.chain.push(id);
        Ok(())
    }

    fn exit(&mut self) {
        self.chain.pop();
    }
}

/// Resolves capabilities to service instances.
///
/// ```rust,ignore
/// let container = ServiceContainer::new();
/// container.register(descriptor)?;
///
/// let ctx = ActivationContext::new().with_profile("dev");
/// let greeter: Arc<dyn Greeter> = container.resolve::<dyn Greeter>(&ctx)?;
///
/// let report = container.teardown();
/// ```
#[derive(Default)]
pub struct ServiceContainer {
    registry: CapabilityRegistry,
    slots: RwLock<HashMap<Arc<str>, Slot>>,
    constructed: Mutex<Vec<ServiceInstance>>,
    closed: AtomicBool,
    debug: bool,
}

impl ServiceContainer {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs every construction with its duration at `info` level instead of
    /// `debug`.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// The underlying registry.
    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Registers a descriptor.
    pub fn register(&self, descriptor: ServiceDescriptor) -> ContainerResult<Arc<ServiceDescriptor>> {
        self.registry.register(descriptor)
    }

    /// Registers several descriptors, stopping at the first failure.
    pub fn register_all(
        &self,
        descriptors: impl IntoIterator<Item = ServiceDescriptor>,
    ) -> ContainerResult<()> {
        descriptors
            .into_iter()
            .try_for_each(|d| self.register(d).map(drop))
    }

    // ── Resolution ──────────────────────────────────────────────────────────

    /// Resolves the single active provider of `C`.
    pub fn resolve<C: ?Sized + 'static>(&self, ctx: &ActivationContext) -> ContainerResult<Arc<C>> {
        let capability = Capability::of::<C>();
        let instance = self.resolve_capability(capability, ctx)?;
        instance.get::<C>().ok_or_else(|| ContainerError::TypeMismatch {
            id: instance.id().to_string(),
            capability,
        })
    }

    /// Like [`resolve`](Self::resolve), but maps "no provider" to `None`.
    pub fn try_resolve<C: ?Sized + 'static>(
        &self,
        ctx: &ActivationContext,
    ) -> ContainerResult<Option<Arc<C>>> {
        match self.resolve::<C>(ctx) {
            Ok(service) => Ok(Some(service)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Resolves every active provider of `C`, in registration order.
    pub fn resolve_all<C: ?Sized + 'static>(
        &self,
        ctx: &ActivationContext,
    ) -> ContainerResult<Vec<Arc<C>>> {
        let capability = Capability::of::<C>();
        self.resolve_all_capability(capability, ctx)?
            .into_iter()
            .map(|instance| {
                instance.get::<C>().ok_or_else(|| ContainerError::TypeMismatch {
                    id: instance.id().to_string(),
                    capability,
                })
            })
            .collect()
    }

    /// Untyped form of [`resolve`](Self::resolve).
    pub fn resolve_capability(
        &self,
        capability: Capability,
        ctx: &ActivationContext,
    ) -> ContainerResult<ServiceInstance> {
        let mut stack = ResolutionStack::default();
        self.resolve_with(capability, ctx, &mut stack)
    }

    /// Untyped form of [`resolve_all`](Self::resolve_all).
    pub fn resolve_all_capability(
        &self,
        capability: Capability,
        ctx: &ActivationContext,
    ) -> ContainerResult<Vec<ServiceInstance>> {
        let mut stack = ResolutionStack::default();
        self.resolve_all_with(capability, ctx, &mut stack)
    }

    /// Availability of every provider of `capability` under `ctx`.
    pub fn explain(&self, capability: Capability, ctx: &ActivationContext) -> Vec<Availability> {
        self.registry.explain(capability, ctx)
    }

    /// Returns `true` if the singleton `id` has been built and not released.
    pub fn is_instantiated(&self, id: &str) -> bool {
        self.slots
            .read()
            .get(id)
            .is_some_and(|slot| slot.lock().is_some())
    }

    fn resolve_with(
        &self,
        capability: Capability,
        ctx: &ActivationContext,
        stack: &mut ResolutionStack,
    ) -> ContainerResult<ServiceInstance> {
        let descriptor = self.registry.find_one(capability, ctx)?;
        self.instantiate(&descriptor, ctx, stack)
    }

    fn resolve_all_with(
        &self,
        capability: Capability,
        ctx: &ActivationContext,
        stack: &mut ResolutionStack,
    ) -> ContainerResult<Vec<ServiceInstance>> {
        self.registry
            .find(capability, ctx)
            .iter()
            .map(|descriptor| self.instantiate(descriptor, ctx, stack))
            .collect()
    }

    fn slot(&self, id: &Arc<str>) -> Slot {
        if let Some(slot) = self.slots.read().get(id) {
            return Arc::clone(slot);
        }
        Arc::clone(self.slots.write().entry(Arc::clone(id)).or_default())
    }

    fn instantiate(
        &self,
        descriptor: &Arc<ServiceDescriptor>,
        ctx: &ActivationContext,
        stack: &mut ResolutionStack,
    ) -> ContainerResult<ServiceInstance> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ContainerError::Closed);
        }

        let id = descriptor.shared_id();
        let singleton = descriptor.lifecycle() == Lifecycle::Singleton;
        if singleton {
            if let Some(instance) = self.slot(&id).lock().as_ref() {
                return Ok(instance.clone());
            }
        }

        stack.enter(Arc::clone(&id))?;
        let deps = self.resolve_dependencies(descriptor, ctx, stack);
        stack.exit();
        let deps = deps?;

        if !singleton {
            return self.construct(descriptor, &deps);
        }

        let slot = self.slot(&id);
        let mut guard = slot.lock();
        if let Some(instance) = guard.as_ref() {
            return Ok(instance.clone());
        }
        let instance = self.construct(descriptor, &deps)?;

        let mut constructed = self.constructed.lock();
        if self.closed.load(Ordering::Acquire) {
            drop(constructed);
            if let Err(e) = release_one(&instance) {
                warn!(service = %id, error = %e, "Release after teardown failed");
            }
            return Err(ContainerError::Closed);
        }
        constructed.push(instance.clone());
        *guard = Some(instance.clone());
        Ok(instance)
    }

    fn resolve_dependencies(
        &self,
        descriptor: &ServiceDescriptor,
        ctx: &ActivationContext,
        stack: &mut ResolutionStack,
    ) -> ContainerResult<Dependencies> {
        let mut deps = Dependencies::new(descriptor.shared_id(), ctx.clone());
        for dependency in descriptor.dependencies() {
            let capability = dependency.capability;
            let wrap = |source: ContainerError| match source {
                ContainerError::CyclicDependency { .. } | ContainerError::Closed => source,
                source => ContainerError::Dependency {
                    id: descriptor.id().to_string(),
                    capability,
                    source: Box::new(source),
                },
            };

            match dependency.kind {
                DependencyKind::Required => {
                    let instance = self.resolve_with(capability, ctx, stack).map_err(wrap)?;
                    deps.push_one(capability, Some(instance));
                }
                DependencyKind::Optional => match self.resolve_with(capability, ctx, stack) {
                    Ok(instance) => deps.push_one(capability, Some(instance)),
                    Err(e) if e.is_not_found() => deps.push_one(capability, None),
                    Err(e) => return Err(wrap(e)),
                },
                DependencyKind::All => {
                    let instances = self.resolve_all_with(capability, ctx, stack).map_err(wrap)?;
                    deps.push_all(capability, instances);
                }
            }
        }
        Ok(deps)
    }

    fn construct(
        &self,
        descriptor: &Arc<ServiceDescriptor>,
        deps: &Dependencies,
    ) -> ContainerResult<ServiceInstance> {
        let start = Instant::now();
        let result = catch_unwind(AssertUnwindSafe(|| descriptor.build(deps)))
            .unwrap_or_else(|panic| Err(panic_message(panic).into()));

        let object = result.map_err(|source| {
            error!(service = descriptor.id(), error = %source, "Service construction failed");
            ContainerError::Construction {
                id: descriptor.id().to_string(),
                source,
            }
        })?;

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        if self.debug {
            info!(service = descriptor.id(), elapsed_ms, "Service created");
        } else {
            debug!(service = descriptor.id(), elapsed_ms, "Service created");
        }
        Ok(ServiceInstance::new(Arc::clone(descriptor), object))
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    /// Builds every eager singleton whose predicates pass under `ctx`.
    ///
    /// Returns `(id, error)` for each eager service that failed; successful
    /// ones are cached as usual.
    pub fn instantiate_eager(&self, ctx: &ActivationContext) -> Vec<(String, ContainerError)> {
        let mut failures = Vec::new();
        for descriptor in self.registry.descriptors() {
            if !descriptor.is_eager() || descriptor.availability(ctx).is_err() {
                continue;
            }
            let mut stack = ResolutionStack::default();
            if let Err(e) = self.instantiate(&descriptor, ctx, &mut stack) {
                warn!(service = descriptor.id(), error = %e, "Eager service failed to start");
                failures.push((descriptor.id().to_string(), e));
            }
        }
        failures
    }

    /// Releases every singleton in reverse construction order.
    ///
    /// Release failures and panics are logged and collected; the remaining
    /// instances are still released.  After teardown the container refuses
    /// further resolution with [`ContainerError::Closed`].  Calling teardown
    /// again releases nothing.
    pub fn teardown(&self) -> TeardownReport {
        let instances = {
            let mut constructed = self.constructed.lock();
            self.closed.store(true, Ordering::Release);
            std::mem::take(&mut *constructed)
        };

        let mut report = TeardownReport::default();
        for instance in instances.iter().rev() {
            match release_one(instance) {
                Ok(()) => debug!(service = instance.id(), "Service released"),
                Err(message) => {
                    error!(service = instance.id(), error = %message, "Service release failed");
                    report.failures.push((instance.id().to_string(), message));
                }
            }
            report.released.push(instance.id().to_string());
        }

        for slot in self.slots.read().values() {
            slot.lock().take();
        }

        if !report.released.is_empty() {
            info!(
                released = report.released.len(),
                failed = report.failures.len(),
                "Service container torn down"
            );
        }
        report
    }

    /// Returns `true` once [`teardown`](Self::teardown) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

fn release_one(instance: &ServiceInstance) -> Result<(), String> {
    let descriptor = instance.descriptor();
    match catch_unwind(AssertUnwindSafe(|| descriptor.release(instance.object()))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(panic) => Err(panic_message(panic)),
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
