//! # Cinder Framework
//!
//! Interaction-level building blocks on top of the service container:
//!
//! - **Ephemeral handlers** ([`timeout`]): callbacks bound to a deadline,
//!   fired once by a [`TimeoutScheduler`] unless cancelled first.
//! - **Option builders** ([`option`]): typed command parameters whose
//!   auxiliary services (resolvers, generators, autocomplete, validators)
//!   come from the [`ServiceContainer`](cinder_core::ServiceContainer).
//!   With the `command` feature, built options render to `clap` arguments.

pub mod error;
pub mod option;
pub mod timeout;

pub use error::{OptionError, OptionResult, TimeoutError, TimeoutResult};
pub use option::{
    AutocompleteHandler, CommandOption, CustomOptionBuilder, GeneratedOptionBuilder,
    OptionBuilder, OptionChoice, OptionKind, OptionParameter, OptionServices, OptionType,
    OptionValidator, ParameterResolver, SlashOptionBuilder, ValueGenerator,
};
pub use timeout::{
    CallbackOutcome, Clock, Dispatch, FireReport, ManualClock, SchedulerHandle, TimeoutCallback,
    TimeoutRegistry, TimeoutScheduler, Token, TokioClock, next_token,
};

#[cfg(feature = "command")]
pub use option::{OptionSet, shell_split};
