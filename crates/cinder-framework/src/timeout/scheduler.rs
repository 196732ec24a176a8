//! Background task firing expired handlers.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::registry::TimeoutRegistry;

/// Drives a [`TimeoutRegistry`]: sleeps until the earliest pending deadline,
/// fires what is due and repeats.
///
/// The wake time is recomputed whenever a registration lands before the
/// current one, so an earlier deadline is never missed.  With nothing
/// pending the loop idles until the next registration.  Callbacks run on
/// their own tasks; the loop never waits for them.
///
/// The registry's clock must follow tokio time (the default
/// [`TokioClock`](super::TokioClock) does).
pub struct TimeoutScheduler {
    registry: Arc<TimeoutRegistry>,
    shutdown: CancellationToken,
}

impl TimeoutScheduler {
    /// Creates a scheduler for `registry`.
    pub fn new(registry: Arc<TimeoutRegistry>) -> Self {
        Self {
            registry,
            shutdown: CancellationToken::new(),
        }
    }

    /// Uses an externally owned shutdown token.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Token stopping the loop when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Spawns the loop on the current tokio runtime.
    pub fn spawn(self) -> SchedulerHandle {
        let shutdown = self.shutdown.clone();
        let task = tokio::spawn(self.run());
        SchedulerHandle { shutdown, task }
    }

    /// Runs the loop until the shutdown token is cancelled.
    pub async fn run(self) {
        debug!("Timeout scheduler started");
        loop {
            let notified = self.registry.wake().notified();
            let next = self.registry.next_deadline();

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = notified => {
                    trace!("Timeout scheduler woken by registration");
                }
                _ = sleep_until_deadline(next) => {
                    let now = self.registry.clock().now();
                    let dispatched = self.registry.dispatch_due(now);
                    trace!(dispatched = dispatched.len(), "Timeout pass dispatched");
                }
            }
        }
        debug!("Timeout scheduler stopped");
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Handle to a spawned [`TimeoutScheduler`].
pub struct SchedulerHandle {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stops the loop and waits for it to exit.
    ///
    /// Callbacks already dispatched keep running on their own tasks.
    pub async fn stop(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Timeout scheduler task failed");
        }
    }

    /// Returns `true` once the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
