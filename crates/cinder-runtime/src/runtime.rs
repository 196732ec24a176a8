//! Runtime lifecycle: configuration, service container and timeout scheduler.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use cinder_runtime::CinderRuntime;
//!
//! // Auto-loads cinder.toml from the current directory
//! let runtime = CinderRuntime::new();
//! runtime.run().await?;
//!
//! // Custom configuration
//! let runtime = CinderRuntime::builder()
//!     .config_file("config/cinder.toml")
//!     .profile("production")
//!     .build()?;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cinder_core::{ActivationContext, ServiceContainer, ServiceDescriptor};
use cinder_framework::{
    SchedulerHandle, TimeoutCallback, TimeoutRegistry, TimeoutScheduler, Token,
};
use tokio::signal;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::{CinderConfig, ConfigLoader, ConfigResult};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging::{self, LoggingGuard};

/// Descriptor id under which the runtime's [`TimeoutRegistry`] is registered.
pub const TIMEOUT_REGISTRY_SERVICE: &str = "cinder.timeout_registry";

type TimeoutErrorHook = Arc<dyn Fn(&Token, &str) + Send + Sync>;

enum RunState {
    Idle,
    Running(SchedulerHandle),
    Stopped,
}

/// Owns the service container and the ephemeral handler registry.
///
/// The lifecycle is one-shot: [`start`](Self::start) registers the linked
/// services, builds eager singletons and spawns the timeout scheduler;
/// [`stop`](Self::stop) stops the scheduler and tears the container down.
/// A stopped runtime cannot be restarted.
pub struct CinderRuntime {
    config: CinderConfig,
    context: ActivationContext,
    container: Arc<ServiceContainer>,
    timeouts: Arc<TimeoutRegistry>,
    state: Mutex<RunState>,
    _logging: Option<LoggingGuard>,
}

impl CinderRuntime {
    /// Creates a runtime from the default configuration sources.
    ///
    /// Falls back to built-in defaults when loading fails.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .load()
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                CinderConfig::default()
            });

        Self::from_config(&config)
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from a loaded configuration.
    ///
    /// Installs the global log subscriber unless one is already set.
    pub fn from_config(config: &CinderConfig) -> Self {
        Self::with_parts(config, None)
    }

    fn with_parts(config: &CinderConfig, on_timeout_error: Option<TimeoutErrorHook>) -> Self {
        let logging = logging::init_from_config(&config.logging);

        let mut timeouts = TimeoutRegistry::default().with_max_timeout(config.timeouts.max_timeout());
        if let Some(hook) = on_timeout_error {
            timeouts = timeouts.with_error_reporter(move |token, message| hook(token, message));
        }

        info!(
            log_level = %config.logging.level,
            profile = ?config.services.profile,
            debug = config.services.debug,
            "Runtime initialized from configuration"
        );

        Self {
            context: config.services.activation_context(),
            container: Arc::new(ServiceContainer::new().with_debug(config.services.debug)),
            timeouts: Arc::new(timeouts),
            state: Mutex::new(RunState::Idle),
            config: config.clone(),
            _logging: logging,
        }
    }

    pub fn config(&self) -> &CinderConfig {
        &self.config
    }

    /// Activation context built from the `services` configuration.
    pub fn context(&self) -> &ActivationContext {
        &self.context
    }

    pub fn container(&self) -> &Arc<ServiceContainer> {
        &self.container
    }

    pub fn timeouts(&self) -> &Arc<TimeoutRegistry> {
        &self.timeouts
    }

    /// Registers a descriptor with the container.
    pub fn register(&self, descriptor: ServiceDescriptor) -> RuntimeResult<()> {
        self.container.register(descriptor)?;
        Ok(())
    }

    /// Resolves `C` under the runtime's activation context.
    pub fn resolve<C: ?Sized + 'static>(&self) -> RuntimeResult<Arc<C>> {
        Ok(self.container.resolve::<C>(&self.context)?)
    }

    /// Registers an ephemeral handler expiring after the configured
    /// `timeouts.default_timeout_ms`.
    pub fn register_timeout(
        &self,
        token: impl Into<Token>,
        callback: impl TimeoutCallback,
    ) -> RuntimeResult<()> {
        self.register_timeout_after(token, self.config.timeouts.default_timeout(), callback)
    }

    pub fn register_timeout_after(
        &self,
        token: impl Into<Token>,
        after: Duration,
        callback: impl TimeoutCallback,
    ) -> RuntimeResult<()> {
        self.timeouts.register_after(token, after, callback)?;
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        matches!(*self.state.lock().await, RunState::Running(_))
    }

    /// Starts the runtime.
    ///
    /// If any eager service fails to build the container is torn down, the
    /// runtime ends up stopped and [`RuntimeError::EagerStartup`] lists the
    /// failures.
    pub async fn start(&self) -> RuntimeResult<()> {
        let mut state = self.state.lock().await;
        match *state {
            RunState::Running(_) => {
                warn!("Runtime is already running");
                return Ok(());
            }
            RunState::Stopped => return Err(RuntimeError::Stopped),
            RunState::Idle => {}
        }

        info!("Starting Cinder runtime");

        if let Err(e) = self.prepare_services() {
            error!(error = %e, "Runtime failed to start");
            self.container.teardown();
            *state = RunState::Stopped;
            return Err(e);
        }

        let scheduler = TimeoutScheduler::new(Arc::clone(&self.timeouts)).spawn();
        *state = RunState::Running(scheduler);

        info!(
            services = self.container.registry().len(),
            "Runtime started"
        );
        Ok(())
    }

    fn prepare_services(&self) -> RuntimeResult<()> {
        self.container.register(
            ServiceDescriptor::builder::<TimeoutRegistry>(TIMEOUT_REGISTRY_SERVICE)
                .shared(Arc::clone(&self.timeouts)),
        )?;

        let linked = self.container.register_linked()?;
        debug!(linked, "Linked services registered");

        let failures = self.container.instantiate_eager(&self.context);
        if !failures.is_empty() {
            return Err(RuntimeError::EagerStartup(failures));
        }
        Ok(())
    }

    /// Stops the scheduler and tears the container down.
    ///
    /// Pending handlers are dropped when `timeouts.clear_on_shutdown` is set;
    /// otherwise the ones already due fire one last time and the rest stay
    /// in the registry unfired.
    pub async fn stop(&self) -> RuntimeResult<()> {
        let mut state = self.state.lock().await;
        let scheduler = match std::mem::replace(&mut *state, RunState::Stopped) {
            RunState::Running(scheduler) => scheduler,
            previous => {
                *state = previous;
                warn!("Runtime is not running");
                return Ok(());
            }
        };

        info!("Stopping Cinder runtime");
        scheduler.stop().await;

        if self.config.timeouts.clear_on_shutdown {
            let cleared = self.timeouts.clear();
            if cleared > 0 {
                info!(cleared, "Dropped pending timeout handlers");
            }
        } else {
            let report = self.timeouts.fire_expired().await;
            debug!(
                fired = report.fired.len(),
                pending = self.timeouts.len(),
                "Fired due timeout handlers before shutdown"
            );
        }

        let report = self.container.teardown();
        if !report.is_clean() {
            warn!(
                failed = report.failures.len(),
                "Some services failed to release"
            );
        }

        info!("Runtime stopped");
        Ok(())
    }

    /// Runs the runtime until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.start().await?;
        info!("Cinder runtime is now running. Press Ctrl+C to stop.");

        let signal = wait_for_signal().await;
        if let Err(e) = &signal {
            error!(error = %e, "Signal listener failed, shutting down");
        }

        self.stop().await?;
        Ok(signal?)
    }

    /// Runs the runtime until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        self.stop().await
    }
}

impl Default for CinderRuntime {
    fn default() -> Self {
        Self::new()
    }
}

async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`CinderRuntime`] with custom configuration.
///
/// ```rust,ignore
/// let runtime = CinderRuntime::builder()
///     .config_file("config/cinder.toml")
///     .profile("production")
///     .on_timeout_error(|token, error| metrics::record(token, error))
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    on_timeout_error: Option<TimeoutErrorHook>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            on_timeout_error: None,
        }
    }

    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: CinderConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Receives every failed or panicking timeout callback.
    pub fn on_timeout_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Token, &str) + Send + Sync + 'static,
    {
        self.on_timeout_error = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> ConfigResult<CinderRuntime> {
        let config = self.config_loader.load()?;
        Ok(CinderRuntime::with_parts(&config, self.on_timeout_error))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use cinder_core::{ActivationPredicate, ContainerError};
    use parking_lot::Mutex as SyncMutex;
    use tokio::time::sleep;

    struct Probe;

    #[tokio::test]
    async fn test_start_registers_timeout_registry() {
        let runtime = CinderRuntime::from_config(&CinderConfig::default());
        runtime.start().await.unwrap();

        let registry = runtime.resolve::<TimeoutRegistry>().unwrap();
        assert!(Arc::ptr_eq(&registry, runtime.timeouts()));
        assert!(runtime.is_running().await);

        runtime.stop().await.unwrap();
        assert!(!runtime.is_running().await);
    }

    #[tokio::test]
    async fn test_eager_services_built_at_start_and_released_at_stop() {
        let runtime = CinderRuntime::from_config(&CinderConfig::default());
        let events = Arc::new(SyncMutex::new(Vec::new()));

        let log = Arc::clone(&events);
        let release_log = Arc::clone(&events);
        runtime
            .register(
                ServiceDescriptor::builder::<Probe>("probe")
                    .eager()
                    .on_release(move |_| {
                        release_log.lock().push("released");
                        Ok(())
                    })
                    .construct(move |_| {
                        log.lock().push("built");
                        Ok(Probe)
                    }),
            )
            .unwrap();

        runtime.start().await.unwrap();
        assert!(runtime.container().is_instantiated("probe"));
        assert_eq!(*events.lock(), vec!["built"]);

        runtime.stop().await.unwrap();
        assert_eq!(*events.lock(), vec!["built", "released"]);
        assert!(runtime.container().is_closed());
    }

    #[tokio::test]
    async fn test_eager_failure_aborts_start() {
        let runtime = CinderRuntime::from_config(&CinderConfig::default());
        runtime
            .register(
                ServiceDescriptor::builder::<Probe>("broken")
                    .eager()
                    .construct(|_| Err("no database".into())),
            )
            .unwrap();

        let err = runtime.start().await.unwrap_err();
        match err {
            RuntimeError::EagerStartup(failures) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].0, "broken");
                assert!(matches!(failures[0].1, ContainerError::Construction { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(runtime.container().is_closed());
        assert!(matches!(runtime.start().await, Err(RuntimeError::Stopped)));
    }

    #[tokio::test]
    async fn test_profile_from_config_gates_services() {
        let mut config = CinderConfig::default();
        config.services.profile = Some("prod".to_string());
        let runtime = CinderRuntime::from_config(&config);
        runtime
            .register(
                ServiceDescriptor::builder::<Probe>("dev_only")
                    .when(ActivationPredicate::profile("dev"))
                    .construct(|_| Ok(Probe)),
            )
            .unwrap();

        let err = runtime.resolve::<Probe>().err().unwrap();
        assert!(matches!(err, RuntimeError::Container(ContainerError::NotFound { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_fires_registered_timeouts() {
        let runtime = CinderRuntime::from_config(&CinderConfig::default());
        runtime.start().await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        runtime
            .register_timeout_after("button:1", Duration::from_secs(5), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        sleep(Duration::from_secs(6)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        runtime.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_clears_pending_timeouts() {
        let runtime = CinderRuntime::from_config(&CinderConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));

        runtime
            .run_until(async {
                let counter = Arc::clone(&calls);
                runtime
                    .register_timeout("modal:7", move || async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap();
                sleep(Duration::from_secs(60)).await;
            })
            .await
            .unwrap();

        assert!(runtime.timeouts().is_empty());
        sleep(Duration::from_secs(3600)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_without_clear_keeps_future_timeouts() {
        let mut config = CinderConfig::default();
        config.timeouts.clear_on_shutdown = false;
        let runtime = CinderRuntime::from_config(&config);
        runtime.start().await.unwrap();

        runtime
            .register_timeout_after("later", Duration::from_secs(600), || async {})
            .unwrap();
        runtime.stop().await.unwrap();

        assert!(runtime.timeouts().is_pending("later"));
    }

    #[tokio::test]
    async fn test_deadline_beyond_max_timeout_is_rejected() {
        let mut config = CinderConfig::default();
        config.timeouts.max_timeout_ms = 1_000;
        config.timeouts.default_timeout_ms = 1_000;
        let runtime = CinderRuntime::from_config(&config);

        let err = runtime
            .register_timeout_after("too_far", Duration::from_secs(10), || async {})
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let runtime = CinderRuntime::from_config(&CinderConfig::default());
        runtime.stop().await.unwrap();
        assert!(!runtime.container().is_closed());
        runtime.start().await.unwrap();
        runtime.stop().await.unwrap();
    }
}
