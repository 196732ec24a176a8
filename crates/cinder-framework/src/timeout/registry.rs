//! Pending ephemeral handlers keyed by token.
//!
//! Every entry moves through `PENDING → FIRED` or `PENDING → CANCELLED`
//! exactly once.  Both transitions happen while holding the state lock by
//! removing the entry from the live set, so whichever of [`cancel`] and
//! [`fire_due`] gets there first wins and the other sees nothing.
//!
//! [`cancel`]: TimeoutRegistry::cancel
//! [`fire_due`]: TimeoutRegistry::fire_due

use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, trace};

use super::callback::TimeoutCallback;
use super::clock::{Clock, TokioClock};
use super::token::Token;
use crate::error::{TimeoutError, TimeoutResult};

type ErrorReporter = dyn Fn(&Token, &str) + Send + Sync;

/// Deadline plus a registration sequence number; orders equal deadlines by
/// registration.
type QueueKey = (Instant, u64);

struct Entry {
    key: QueueKey,
    created_at: Instant,
    callback: Box<dyn TimeoutCallback>,
}

#[derive(Default)]
struct State {
    entries: HashMap<Token, Entry>,
    queue: BTreeMap<QueueKey, Token>,
    seq: u64,
}

impl State {
    fn earliest(&self) -> Option<Instant> {
        self.queue.first_key_value().map(|((deadline, _), _)| *deadline)
    }

    fn insert(&mut self, token: Token, deadline: Instant, created_at: Instant, callback: Box<dyn TimeoutCallback>) {
        self.seq += 1;
        let key = (deadline, self.seq);
        self.queue.insert(key, token.clone());
        self.entries.insert(
            token,
            Entry {
                key,
                created_at,
                callback,
            },
        );
    }
}

/// Outcome of one [`TimeoutRegistry::fire_due`] pass.
#[derive(Debug, Default)]
pub struct FireReport {
    /// Tokens whose callbacks ran, in firing order (failures included).
    pub fired: Vec<Token>,
    /// `(token, message)` for callbacks that returned an error or panicked.
    pub failures: Vec<(Token, String)>,
}

impl FireReport {
    /// Returns `true` if nothing was due.
    pub fn is_empty(&self) -> bool {
        self.fired.is_empty()
    }
}

/// Callbacks started by one [`TimeoutRegistry::dispatch_due`] pass, each on
/// its own task.
///
/// Dropping it detaches the tasks; they still run to completion and report
/// their own failures.
#[must_use = "dropping the dispatch detaches the callbacks"]
#[derive(Debug, Default)]
pub struct Dispatch {
    running: Vec<(Token, JoinHandle<Option<String>>)>,
}

impl Dispatch {
    /// Tokens dispatched, in firing order.
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.running.iter().map(|(token, _)| token)
    }

    /// Number of dispatched callbacks.
    pub fn len(&self) -> usize {
        self.running.len()
    }

    /// Returns `true` if nothing was due.
    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }

    /// Waits for every dispatched callback and collects the outcome.
    pub async fn join(self) -> FireReport {
        let mut report = FireReport::default();
        for (token, task) in self.running {
            let failure = match task.await {
                Ok(failure) => failure,
                Err(e) => Some(e.to_string()),
            };
            if let Some(message) = failure {
                report.failures.push((token.clone(), message));
            }
            report.fired.push(token);
        }
        report
    }
}

/// Registry of short-lived callbacks with deadlines.
///
/// Safe to share across threads behind an `Arc`.  Registration and
/// cancellation are synchronous.  Due callbacks run on their own tokio
/// tasks, so a slow callback never holds up another one.
pub struct TimeoutRegistry {
    state: Mutex<State>,
    pass: Mutex<()>,
    wake: Notify,
    clock: Arc<dyn Clock>,
    max_timeout: Option<Duration>,
    reporter: Option<Arc<ErrorReporter>>,
}

impl Default for TimeoutRegistry {
    fn default() -> Self {
        Self::new(Arc::new(TokioClock))
    }
}

impl TimeoutRegistry {
    /// Creates an empty registry reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            pass: Mutex::new(()),
            wake: Notify::new(),
            clock,
            max_timeout: None,
            reporter: None,
        }
    }

    /// Rejects deadlines further than `max` from now.
    pub fn with_max_timeout(mut self, max: Duration) -> Self {
        self.max_timeout = Some(max);
        self
    }

    /// Installs a hook receiving every callback failure.
    pub fn with_error_reporter<F>(mut self, reporter: F) -> Self
    where
        F: Fn(&Token, &str) + Send + Sync + 'static,
    {
        self.reporter = Some(Arc::new(reporter));
        self
    }

    /// The registry's clock.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub(crate) fn wake(&self) -> &Notify {
        &self.wake
    }

    fn check_deadline(&self, token: &Token, deadline: Instant, now: Instant) -> TimeoutResult<()> {
        match self.max_timeout {
            Some(max) if deadline.saturating_duration_since(now) > max => {
                Err(TimeoutError::DeadlineTooFar {
                    token: token.clone(),
                    requested: deadline - now,
                    max,
                })
            }
            _ => Ok(()),
        }
    }

    fn deadline_after(&self, token: &Token, after: Duration) -> TimeoutResult<Instant> {
        self.clock
            .now()
            .checked_add(after)
            .ok_or_else(|| TimeoutError::DeadlineTooFar {
                token: token.clone(),
                requested: after,
                max: self.max_timeout.unwrap_or(Duration::MAX),
            })
    }

    /// Registers `callback` to fire once `deadline` has passed.
    ///
    /// Fails with [`TimeoutError::DuplicateToken`] while another entry with
    /// the same token is pending; the pending entry is left untouched.  A
    /// deadline earlier than the current earliest one wakes the scheduler.
    pub fn register(
        &self,
        token: impl Into<Token>,
        deadline: Instant,
        callback: impl TimeoutCallback,
    ) -> TimeoutResult<()> {
        let token = token.into();
        let now = self.clock.now();

        let wake = {
            let mut state = self.state.lock();
            if state.entries.contains_key(&token) {
                return Err(TimeoutError::DuplicateToken(token));
            }
            self.check_deadline(&token, deadline, now)?;
            let earlier = state.earliest().is_none_or(|current| deadline < current);
            state.insert(token.clone(), deadline, now, Box::new(callback));
            earlier
        };

        trace!(%token, in_ms = deadline.saturating_duration_since(now).as_millis() as u64, "Timeout registered");
        if wake {
            self.wake.notify_one();
        }
        Ok(())
    }

    /// Registers `callback` to fire `after` from now.
    pub fn register_after(
        &self,
        token: impl Into<Token>,
        after: Duration,
        callback: impl TimeoutCallback,
    ) -> TimeoutResult<()> {
        let token = token.into();
        let deadline = self.deadline_after(&token, after)?;
        self.register(token, deadline, callback)
    }

    /// Cancels a pending entry.
    ///
    /// Returns `true` if the entry was pending.  Unknown, fired and already
    /// cancelled tokens are a no-op returning `false`.
    pub fn cancel(&self, token: impl Into<Token>) -> bool {
        let token = token.into();
        let removed = {
            let mut state = self.state.lock();
            match state.entries.remove(&token) {
                Some(entry) => {
                    state.queue.remove(&entry.key);
                    true
                }
                None => false,
            }
        };
        if removed {
            trace!(%token, "Timeout cancelled");
        }
        removed
    }

    /// Moves a pending entry's deadline.
    ///
    /// Returns `false` if the token is not pending.  The entry keeps its
    /// callback but is ordered as if registered now among equal deadlines.
    pub fn reset(&self, token: impl Into<Token>, deadline: Instant) -> TimeoutResult<bool> {
        let token = token.into();
        let now = self.clock.now();

        let wake = {
            let mut state = self.state.lock();
            if !state.entries.contains_key(&token) {
                return Ok(false);
            }
            self.check_deadline(&token, deadline, now)?;
            let Some(entry) = state.entries.remove(&token) else {
                return Ok(false);
            };
            state.queue.remove(&entry.key);
            let earlier = state.earliest().is_none_or(|current| deadline < current);
            state.insert(token.clone(), deadline, entry.created_at, entry.callback);
            earlier
        };

        trace!(%token, "Timeout reset");
        if wake {
            self.wake.notify_one();
        }
        Ok(true)
    }

    /// Moves a pending entry's deadline to `after` from now.
    pub fn reset_after(&self, token: impl Into<Token>, after: Duration) -> TimeoutResult<bool> {
        let token = token.into();
        let deadline = self.deadline_after(&token, after)?;
        self.reset(token, deadline)
    }

    /// Removes every pending entry without firing it.
    ///
    /// Returns the number of dropped entries.
    pub fn clear(&self) -> usize {
        let dropped = {
            let mut state = self.state.lock();
            let dropped = state.entries.len();
            state.entries.clear();
            state.queue.clear();
            dropped
        };
        if dropped > 0 {
            debug!(dropped, "Pending timeouts cleared");
        }
        dropped
    }

    /// Returns `true` if `token` is pending.
    pub fn is_pending(&self, token: impl Into<Token>) -> bool {
        self.state.lock().entries.contains_key(&token.into())
    }

    /// Deadline of a pending entry.
    pub fn deadline(&self, token: impl Into<Token>) -> Option<Instant> {
        self.state
            .lock()
            .entries
            .get(&token.into())
            .map(|entry| entry.key.0)
    }

    /// Earliest pending deadline, or `None` when idle.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.state.lock().earliest()
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns `true` when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts every pending entry whose deadline is at or before `now`.
    ///
    /// Due entries leave the live set before any callback runs.  Each
    /// callback is spawned on its own task, in deadline order and equal
    /// deadlines in registration order; this call does not wait for them.
    /// Errors and panics are logged and passed to the error reporter from
    /// inside the task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch_due(&self, now: Instant) -> Dispatch {
        let _pass = self.pass.lock();

        let due: Vec<(Token, Entry)> = {
            let mut state = self.state.lock();
            let mut due = Vec::new();
            while let Some(entry) = state.queue.first_entry() {
                if entry.key().0 > now {
                    break;
                }
                let token = entry.remove();
                if let Some(pending) = state.entries.remove(&token) {
                    due.push((token, pending));
                }
            }
            due
        };

        let running = due
            .into_iter()
            .map(|(token, entry)| {
                let task = self.spawn_callback(token.clone(), entry, now);
                (token, task)
            })
            .collect();
        Dispatch { running }
    }

    /// Fires every due entry and waits for all of their callbacks.
    ///
    /// Callbacks still run concurrently; failures never stop the others and
    /// are collected in the report in firing order.
    pub async fn fire_due(&self, now: Instant) -> FireReport {
        self.dispatch_due(now).join().await
    }

    /// Fires every entry due according to the registry's clock.
    pub async fn fire_expired(&self) -> FireReport {
        let now = self.clock.now();
        self.fire_due(now).await
    }

    fn spawn_callback(&self, token: Token, entry: Entry, now: Instant) -> JoinHandle<Option<String>> {
        let reporter = self.reporter.clone();
        tokio::spawn(async move {
            let lived_ms = now.saturating_duration_since(entry.created_at).as_millis() as u64;
            let outcome = AssertUnwindSafe(entry.callback.fire()).catch_unwind().await;
            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(panic) => Some(panic_message(panic)),
            };

            match &failure {
                None => debug!(%token, lived_ms, "Timeout fired"),
                Some(message) => {
                    error!(%token, error = %message, "Timeout callback failed");
                    if let Some(reporter) = &reporter {
                        reporter(&token, message);
                    }
                }
            }
            failure
        })
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(s) => format!("panicked: {s}"),
        Err(panic) => match panic.downcast_ref::<&str>() {
            Some(s) => format!("panicked: {s}"),
            None => "panicked".to_string(),
        },
    }
}
