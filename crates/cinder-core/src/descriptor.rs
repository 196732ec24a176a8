//! Service descriptors: immutable metadata describing how and when to build
//! a service.
//!
//! A [`ServiceDescriptor`] bundles:
//!
//! - a unique **id** (used in logs, errors and for duplicate detection);
//! - the set of **capabilities** it provides, each with an upcast view from
//!   the concrete type to the capability type;
//! - declared **dependencies** resolved by the container before the recipe
//!   runs;
//! - ordered **activation predicates**;
//! - a **lifecycle** ([`Lifecycle::Singleton`] or [`Lifecycle::PerRequest`]);
//! - the **recipe** and an optional **release hook**.
//!
//! Descriptors are created with [`ServiceDescriptor::builder`]:
//!
//! ```rust,ignore
//! trait Greeter: Send + Sync { fn greet(&self) -> String; }
//! struct English { store: Arc<dyn Store> }
//! impl Greeter for English { /* … */ }
//!
//! let descriptor = ServiceDescriptor::builder::<English>("english_greeter")
//!     .provides::<dyn Greeter>(|s| s)
//!     .depends_on::<dyn Store>()
//!     .when(ActivationPredicate::profile("dev"))
//!     .construct(|deps| Ok(English { store: deps.get::<dyn Store>()? }));
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::capability::Capability;
use crate::context::ActivationContext;
use crate::error::BoxError;
use crate::instance::ServiceInstance;
use crate::predicate::ActivationPredicate;

/// Type-erased service object: the concrete `Arc<S>` upcast to `Any`.
pub type ServiceArc = Arc<dyn Any + Send + Sync>;

/// A capability view: a boxed `Arc<C>` produced from the concrete object.
pub(crate) type ViewFn = dyn Fn(&ServiceArc) -> Option<Box<dyn Any + Send + Sync>> + Send + Sync;
type RecipeFn = dyn Fn(&Dependencies) -> Result<ServiceArc, BoxError> + Send + Sync;
type ReleaseFn = dyn Fn(&ServiceArc) -> Result<(), BoxError> + Send + Sync;

/// How long a resolved instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// Built at most once, cached and owned by the container, released at
    /// teardown.
    #[default]
    Singleton,
    /// Built on every resolution and owned by the requester.  Release hooks
    /// are never run for per-request instances.
    PerRequest,
}

/// How a declared dependency is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    /// Exactly one provider must match.
    Required,
    /// Zero or one provider; absence yields `None`.
    Optional,
    /// Every matching provider, in registration order.
    All,
}

/// A dependency declared by a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    /// The required capability.
    pub capability: Capability,
    /// Resolution mode.
    pub kind: DependencyKind,
}

/// Immutable metadata for one registrable service.
pub struct ServiceDescriptor {
    id: Arc<str>,
    type_name: &'static str,
    capabilities: Vec<(Capability, Arc<ViewFn>)>,
    dependencies: Vec<Dependency>,
    predicates: Vec<ActivationPredicate>,
    lifecycle: Lifecycle,
    priority: i32,
    primary: bool,
    eager: bool,
    recipe: Arc<RecipeFn>,
    release: Option<Arc<ReleaseFn>>,
}

impl ServiceDescriptor {
    /// Starts building a descriptor for the concrete service type `S`.
    ///
    /// The concrete type itself is always provided as a capability.
    pub fn builder<S>(id: impl Into<Arc<str>>) -> DescriptorBuilder<S>
    where
        S: Send + Sync + 'static,
    {
        DescriptorBuilder::new(id.into())
    }

    /// Unique id of the service.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn shared_id(&self) -> Arc<str> {
        Arc::clone(&self.id)
    }

    /// Name of the concrete service type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Capabilities in declaration order; the concrete type comes first.
    pub fn capabilities(&self) -> impl Iterator<Item = Capability> + '_ {
        self.capabilities.iter().map(|(cap, _)| *cap)
    }

    /// Returns `true` if this descriptor provides `capability`.
    pub fn provides(&self, capability: Capability) -> bool {
        self.capabilities.iter().any(|(cap, _)| *cap == capability)
    }

    /// Declared dependencies, in declaration order.
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Activation predicates, in evaluation order.
    pub fn predicates(&self) -> &[ActivationPredicate] {
        &self.predicates
    }

    /// The service lifecycle.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Tie-break priority used when several providers match.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Whether this provider wins ties regardless of priority.
    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// Whether the singleton is built at container start instead of lazily.
    pub fn is_eager(&self) -> bool {
        self.eager && self.lifecycle == Lifecycle::Singleton
    }

    /// Evaluates all predicates against `ctx`, returning the first failure.
    pub fn availability(&self, ctx: &ActivationContext) -> Result<(), String> {
        crate::predicate::evaluate_all(&self.predicates, ctx)
    }

    pub(crate) fn view(&self, capability: Capability) -> Option<&Arc<ViewFn>> {
        self.capabilities
            .iter()
            .find(|(cap, _)| *cap == capability)
            .map(|(_, view)| view)
    }

    pub(crate) fn build(&self, deps: &Dependencies) -> Result<ServiceArc, BoxError> {
        (self.recipe)(deps)
    }

    pub(crate) fn release(&self, object: &ServiceArc) -> Result<(), BoxError> {
        match &self.release {
            Some(hook) => hook(object),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field(
                "capabilities",
                &self.capabilities().collect::<Vec<_>>(),
            )
            .field("dependencies", &self.dependencies)
            .field("predicates", &self.predicates)
            .field("lifecycle", &self.lifecycle)
            .field("priority", &self.priority)
            .field("primary", &self.primary)
            .field("eager", &self.eager)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// DescriptorBuilder
// =============================================================================

/// Builder for [`ServiceDescriptor`], typed over the concrete service `S`.
///
/// Finish with [`construct`](Self::construct) (recipe) or
/// [`instance`](Self::instance) (pre-built value).
pub struct DescriptorBuilder<S> {
    id: Arc<str>,
    capabilities: Vec<(Capability, Arc<ViewFn>)>,
    dependencies: Vec<Dependency>,
    predicates: Vec<ActivationPredicate>,
    lifecycle: Lifecycle,
    priority: i32,
    primary: bool,
    eager: bool,
    release: Option<Arc<ReleaseFn>>,
    _marker: std::marker::PhantomData<fn() -> S>,
}

impl<S> DescriptorBuilder<S>
where
    S: Send + Sync + 'static,
{
    fn new(id: Arc<str>) -> Self {
        let own_view: Arc<ViewFn> = Arc::new(|object: &ServiceArc| {
            let concrete = Arc::clone(object).downcast::<S>().ok()?;
            Some(Box::new(concrete) as Box<dyn Any + Send + Sync>)
        });
        Self {
            id,
            capabilities: vec![(Capability::of::<S>(), own_view)],
            dependencies: Vec::new(),
            predicates: Vec::new(),
            lifecycle: Lifecycle::Singleton,
            priority: 0,
            primary: false,
            eager: false,
            release: None,
            _marker: std::marker::PhantomData,
        }
    }

    /// Declares that the service satisfies capability `C`.
    ///
    /// `upcast` converts the concrete `Arc<S>` into `Arc<C>`; for trait
    /// objects the identity closure `|s| s` is enough.
    pub fn provides<C>(mut self, upcast: impl Fn(Arc<S>) -> Arc<C> + Send + Sync + 'static) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let capability = Capability::of::<C>();
        let view: Arc<ViewFn> = Arc::new(move |object: &ServiceArc| {
            let concrete = Arc::clone(object).downcast::<S>().ok()?;
            Some(Box::new(upcast(concrete)) as Box<dyn Any + Send + Sync>)
        });
        if let Some(slot) = self.capabilities.iter_mut().find(|(cap, _)| *cap == capability) {
            slot.1 = view;
        } else {
            self.capabilities.push((capability, view));
        }
        self
    }

    fn dependency(mut self, capability: Capability, kind: DependencyKind) -> Self {
        self.dependencies.push(Dependency { capability, kind });
        self
    }

    /// Declares a required dependency on exactly one provider of `C`.
    pub fn depends_on<C: ?Sized + 'static>(self) -> Self {
        self.dependency(Capability::of::<C>(), DependencyKind::Required)
    }

    /// Declares an optional dependency on at most one provider of `C`.
    pub fn depends_on_optional<C: ?Sized + 'static>(self) -> Self {
        self.dependency(Capability::of::<C>(), DependencyKind::Optional)
    }

    /// Declares a dependency on every active provider of `C`.
    pub fn depends_on_all<C: ?Sized + 'static>(self) -> Self {
        self.dependency(Capability::of::<C>(), DependencyKind::All)
    }

    /// Appends an activation predicate; all predicates must pass.
    pub fn when(mut self, predicate: ActivationPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Sets the lifecycle.
    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Shorthand for `lifecycle(Lifecycle::PerRequest)`.
    pub fn per_request(self) -> Self {
        self.lifecycle(Lifecycle::PerRequest)
    }

    /// Sets the tie-break priority (higher wins, default 0).
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Marks the provider as primary for all of its capabilities.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Builds the singleton at container start rather than on first use.
    pub fn eager(mut self) -> Self {
        self.eager = true;
        self
    }

    /// Registers a hook run on the singleton at container teardown.
    pub fn on_release<F>(mut self, hook: F) -> Self
    where
        F: Fn(&S) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let id = Arc::clone(&self.id);
        self.release = Some(Arc::new(move |object: &ServiceArc| {
            match object.downcast_ref::<S>() {
                Some(service) => hook(service),
                None => Err(format!("release hook of '{id}' received a foreign object").into()),
            }
        }));
        self
    }

    /// Finishes the descriptor with a recipe building `S` from its resolved
    /// dependencies.
    pub fn construct<F>(self, recipe: F) -> ServiceDescriptor
    where
        F: Fn(&Dependencies) -> Result<S, BoxError> + Send + Sync + 'static,
    {
        let recipe: Arc<RecipeFn> =
            Arc::new(move |deps: &Dependencies| recipe(deps).map(|s| Arc::new(s) as ServiceArc));
        self.finish(recipe)
    }

    /// Finishes the descriptor with an already-built singleton.
    ///
    /// The lifecycle is forced to [`Lifecycle::Singleton`]; declared
    /// dependencies are still resolved (and must be satisfiable) before the
    /// instance is handed out.
    pub fn instance(self, value: S) -> ServiceDescriptor {
        self.shared(Arc::new(value))
    }

    /// Like [`instance`](Self::instance), for a value the caller keeps a
    /// handle to: resolving `S` yields the same `Arc`.
    pub fn shared(mut self, value: Arc<S>) -> ServiceDescriptor {
        self.lifecycle = Lifecycle::Singleton;
        let value: ServiceArc = value;
        let recipe: Arc<RecipeFn> = Arc::new(move |_: &Dependencies| Ok(Arc::clone(&value)));
        self.finish(recipe)
    }

    fn finish(self, recipe: Arc<RecipeFn>) -> ServiceDescriptor {
        ServiceDescriptor {
            id: self.id,
            type_name: std::any::type_name::<S>(),
            capabilities: self.capabilities,
            dependencies: self.dependencies,
            predicates: self.predicates,
            lifecycle: self.lifecycle,
            priority: self.priority,
            primary: self.primary,
            eager: self.eager,
            recipe,
            release: self.release,
        }
    }
}

// =============================================================================
// Dependencies
// =============================================================================

enum Resolved {
    One(ServiceInstance),
    Missing,
    Many(Vec<ServiceInstance>),
}

/// Resolved dependencies handed to a recipe.
///
/// Only capabilities declared on the descriptor are available here; the
/// container resolves them (recursively) before the recipe runs.
pub struct Dependencies {
    service: Arc<str>,
    context: ActivationContext,
    resolved: Vec<(Capability, Resolved)>,
}

impl Dependencies {
    pub(crate) fn new(service: Arc<str>, context: ActivationContext) -> Self {
        Self {
            service,
            context,
            resolved: Vec::new(),
        }
    }

    pub(crate) fn push_one(&mut self, capability: Capability, instance: Option<ServiceInstance>) {
        let resolved = match instance {
            Some(instance) => Resolved::One(instance),
            None => Resolved::Missing,
        };
        self.resolved.push((capability, resolved));
    }

    pub(crate) fn push_all(&mut self, capability: Capability, instances: Vec<ServiceInstance>) {
        self.resolved.push((capability, Resolved::Many(instances)));
    }

    /// The activation context the service is being built under.
    ///
    /// Recipes can read typed settings from it with
    /// [`ActivationContext::get_as`].
    pub fn context(&self) -> &ActivationContext {
        &self.context
    }

    fn lookup(&self, capability: Capability) -> Option<&Resolved> {
        self.resolved
            .iter()
            .find(|(cap, _)| *cap == capability)
            .map(|(_, r)| r)
    }

    /// Returns the required (or present optional) dependency `C`.
    ///
    /// Fails when `C` was not declared or an optional `C` is absent.
    pub fn get<C: ?Sized + 'static>(&self) -> Result<Arc<C>, BoxError> {
        let capability = Capability::of::<C>();
        match self.lookup(capability) {
            Some(Resolved::One(instance)) => instance.get::<C>().ok_or_else(|| {
                format!("'{}' does not expose {capability}", instance.id()).into()
            }),
            Some(Resolved::Missing) => {
                Err(format!("optional dependency {capability} of '{}' is absent", self.service).into())
            }
            Some(Resolved::Many(_)) => Err(format!(
                "{capability} was declared with depends_on_all, use get_all"
            )
            .into()),
            None => Err(format!(
                "'{}' did not declare a dependency on {capability}",
                self.service
            )
            .into()),
        }
    }

    /// Returns the optional dependency `C`, or `None` when absent or undeclared.
    pub fn get_optional<C: ?Sized + 'static>(&self) -> Option<Arc<C>> {
        match self.lookup(Capability::of::<C>()) {
            Some(Resolved::One(instance)) => instance.get::<C>(),
            _ => None,
        }
    }

    /// Returns every provider of `C` declared with `depends_on_all`.
    pub fn get_all<C: ?Sized + 'static>(&self) -> Vec<Arc<C>> {
        match self.lookup(Capability::of::<C>()) {
            Some(Resolved::Many(instances)) => instances.iter().filter_map(|i| i.get::<C>()).collect(),
            Some(Resolved::One(instance)) => instance.get::<C>().into_iter().collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    #[test]
    fn test_builder_defaults() {
        let desc = ServiceDescriptor::builder::<English>("english").construct(|_| Ok(English));

        assert_eq!(desc.id(), "english");
        assert_eq!(desc.lifecycle(), Lifecycle::Singleton);
        assert_eq!(desc.priority(), 0);
        assert!(!desc.is_primary());
        assert!(!desc.is_eager());
        assert!(desc.provides(Capability::of::<English>()));
        assert!(!desc.provides(Capability::of::<dyn Greeter>()));
    }

    #[test]
    fn test_builder_capabilities_and_flags() {
        let desc = ServiceDescriptor::builder::<English>("english")
            .provides::<dyn Greeter>(|s| s)
            .depends_on_optional::<String>()
            .when(ActivationPredicate::profile("dev"))
            .priority(5)
            .primary()
            .eager()
            .construct(|_| Ok(English));

        let caps: Vec<_> = desc.capabilities().collect();
        assert_eq!(caps, vec![Capability::of::<English>(), Capability::of::<dyn Greeter>()]);
        assert_eq!(desc.dependencies().len(), 1);
        assert_eq!(desc.dependencies()[0].kind, DependencyKind::Optional);
        assert_eq!(desc.predicates().len(), 1);
        assert_eq!(desc.priority(), 5);
        assert!(desc.is_primary());
        assert!(desc.is_eager());
    }

    #[test]
    fn test_per_request_is_never_eager() {
        let desc = ServiceDescriptor::builder::<English>("english")
            .per_request()
            .eager()
            .construct(|_| Ok(English));
        assert!(!desc.is_eager());
    }

    #[test]
    fn test_view_upcasts() {
        let desc = ServiceDescriptor::builder::<English>("english")
            .provides::<dyn Greeter>(|s| s)
            .construct(|_| Ok(English));

        let deps = Dependencies::new(desc.shared_id(), ActivationContext::new());
        let object = desc.build(&deps).unwrap();
        let view = desc.view(Capability::of::<dyn Greeter>()).unwrap();
        let greeter = view(&object)
            .unwrap()
            .downcast::<Arc<dyn Greeter>>()
            .unwrap();
        assert_eq!(greeter.greet(), "hello");
    }

    #[test]
    fn test_availability() {
        let desc = ServiceDescriptor::builder::<English>("english")
            .when(ActivationPredicate::profile("dev"))
            .construct(|_| Ok(English));

        assert!(desc.availability(&ActivationContext::new().with_profile("dev")).is_ok());
        assert!(desc.availability(&ActivationContext::new()).is_err());
    }

    #[test]
    fn test_undeclared_dependency_is_an_error() {
        let deps = Dependencies::new("svc".into(), ActivationContext::new());
        let err = deps.get::<dyn Greeter>().err().unwrap();
        assert!(err.to_string().contains("did not declare"));
        assert!(deps.get_optional::<dyn Greeter>().is_none());
        assert!(deps.get_all::<dyn Greeter>().is_empty());
    }
}
