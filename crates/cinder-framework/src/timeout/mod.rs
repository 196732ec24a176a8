//! Ephemeral handlers: short-lived callbacks bound to a deadline.
//!
//! A component interaction (button, select menu, modal) usually stays
//! clickable for a limited time.  The handler registers a callback under a
//! [`Token`] with a deadline; the [`TimeoutScheduler`] fires it once the
//! deadline passes, unless the interaction completes first and the owner
//! calls [`TimeoutRegistry::cancel`].
//!
//! ```rust,ignore
//! let registry = Arc::new(TimeoutRegistry::default());
//! let scheduler = TimeoutScheduler::new(Arc::clone(&registry)).spawn();
//!
//! registry.register_after("button:42", Duration::from_secs(900), || async {
//!     tracing::info!("button expired");
//! })?;
//!
//! // Interaction completed: the callback must not fire.
//! registry.cancel("button:42");
//! ```

mod callback;
mod clock;
mod registry;
mod scheduler;
mod token;

pub use callback::{CallbackOutcome, TimeoutCallback};
pub use clock::{Clock, ManualClock, TokioClock};
pub use registry::{Dispatch, FireReport, TimeoutRegistry};
pub use scheduler::{SchedulerHandle, TimeoutScheduler};
pub use token::{Token, next_token};
