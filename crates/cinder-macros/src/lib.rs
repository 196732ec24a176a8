//! Procedural macros for the Cinder bot framework.
//!
//! # `#[service]`
//!
//! Registers a descriptor factory in the link-time feed collected by the
//! runtime at start-up:
//!
//! ```rust,ignore
//! use cinder::prelude::*;
//!
//! #[service]
//! fn dev_greeter() -> ServiceDescriptor {
//!     ServiceDescriptor::builder::<English>("dev_greeter")
//!         .provides::<dyn Greeter>(|s| s)
//!         .when(ActivationPredicate::profile("dev"))
//!         .construct(|_| Ok(English))
//! }
//! ```
//!
//! The factory must be a plain, non-generic, argument-less function
//! returning a `ServiceDescriptor`.

mod service;

use proc_macro::TokenStream;

/// Adds a `fn() -> ServiceDescriptor` factory to
/// `cinder_core::SERVICE_DESCRIPTORS`.
#[proc_macro_attribute]
pub fn service(attr: TokenStream, item: TokenStream) -> TokenStream {
    service::service(attr, item)
}
