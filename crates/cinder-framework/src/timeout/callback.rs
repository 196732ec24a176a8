use std::future::Future;

use async_trait::async_trait;
use cinder_core::BoxError;

/// A deferred zero-argument action run when an ephemeral handler expires.
///
/// Implemented for every `FnOnce() -> impl Future` whose output is `()` or
/// `Result<(), E>`:
///
/// ```rust,ignore
/// registry.register_after("button:42", Duration::from_secs(60), move || async move {
///     message.disable_components().await
/// })?;
/// ```
#[async_trait]
pub trait TimeoutCallback: Send + 'static {
    /// Runs the action.  Consumes the callback: it fires at most once.
    async fn fire(self: Box<Self>) -> Result<(), BoxError>;
}

/// Output types accepted from callback futures.
pub trait CallbackOutcome {
    /// Converts the output into the registry's result type.
    fn into_result(self) -> Result<(), BoxError>;
}

impl CallbackOutcome for () {
    fn into_result(self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<E> CallbackOutcome for Result<(), E>
where
    E: Into<BoxError>,
{
    fn into_result(self) -> Result<(), BoxError> {
        self.map_err(Into::into)
    }
}

#[async_trait]
impl<F, Fut> TimeoutCallback for F
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: CallbackOutcome,
{
    async fn fire(self: Box<Self>) -> Result<(), BoxError> {
        (*self)().await.into_result()
    }
}
