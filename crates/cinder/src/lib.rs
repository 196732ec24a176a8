//! # Cinder
//!
//! Building blocks for interactive bots, organised around a capability-based
//! service container.
//!
//! ## Overview
//!
//! ```text
//! ┌───────────────┐  start   ┌──────────────────┐  resolve   ┌────────────────────┐
//! │ CinderRuntime │────────▶│ ServiceContainer │──────────▶│ active providers   │
//! │  (config,     │         │  (registry,      │           │ (predicates,       │
//! │   logging)    │         │   singletons)    │           │  priority/primary) │
//! └───────┬───────┘         └──────────────────┘           └────────────────────┘
//!         │ spawns
//!         ▼
//! ┌───────────────────┐  fires  ┌──────────────────┐
//! │ TimeoutScheduler  │───────▶│ TimeoutRegistry  │  (ephemeral handlers)
//! └───────────────────┘         └──────────────────┘
//! ```
//!
//! - **Capabilities**: traits or concrete types identified by `TypeId`
//! - **Descriptors**: how to build a service, what it provides and needs,
//!   and when it is active
//! - **Container**: resolves a capability to exactly one active provider
//!   (or all of them), builds singletons once, releases them in reverse order
//! - **Ephemeral handlers**: callbacks fired once when their deadline passes
//!   unless cancelled first
//! - **Options**: command parameters whose helpers come from the container
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cinder::prelude::*;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//! impl Greeter for English {
//!     fn greet(&self) -> String { "hello".into() }
//! }
//!
//! #[service]
//! fn english() -> ServiceDescriptor {
//!     ServiceDescriptor::builder::<English>("english")
//!         .provides::<dyn Greeter>(|s| s)
//!         .construct(|_| Ok(English))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = CinderRuntime::new();
//!     runtime.start().await?;
//!     println!("{}", runtime.resolve::<dyn Greeter>()?.greet());
//!     runtime.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `macros`: the `#[service]` attribute (default)
//! - `command`: render options as `clap` arguments (default)
//! - `toml-config` / `yaml-config`: configuration file formats
//! - `json-log`: JSON log output

pub use cinder_core as core;
pub use cinder_framework as framework;
pub use cinder_runtime as runtime;

#[cfg(feature = "macros")]
pub use cinder_macros::service;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use cinder::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use cinder_runtime::{CinderConfig, CinderRuntime, RuntimeError, RuntimeResult};

    // Service container
    pub use cinder_core::{
        ActivationContext, ActivationPredicate, BoxError, Capability, ContainerError,
        ContainerResult, Dependencies, Lifecycle, ServiceContainer, ServiceDescriptor,
    };

    #[cfg(feature = "macros")]
    pub use cinder_macros::service;

    // Ephemeral handlers
    pub use cinder_framework::{TimeoutError, TimeoutRegistry, Token, next_token};

    // Command options
    pub use cinder_framework::{
        AutocompleteHandler, CommandOption, CustomOptionBuilder, GeneratedOptionBuilder,
        OptionBuilder, OptionChoice, OptionError, OptionParameter, OptionType, OptionValidator,
        ParameterResolver, SlashOptionBuilder, ValueGenerator,
    };

    #[cfg(feature = "command")]
    pub use cinder_framework::OptionSet;

    // Logging macros
    pub use cinder_runtime::prelude::*;
}
