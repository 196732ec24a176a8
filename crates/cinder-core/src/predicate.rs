//! Activation predicates gating service availability.
//!
//! A descriptor carries an ordered list of predicates; it is eligible for a
//! lookup only when **all** of them pass against the current
//! [`ActivationContext`].  A failing predicate reports *why* the service is
//! unavailable, which ends up in [`ContainerError::NotFound`] and in
//! [`ServiceContainer::explain`].
//!
//! [`ContainerError::NotFound`]: crate::ContainerError::NotFound
//! [`ServiceContainer::explain`]: crate::ServiceContainer::explain

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::context::ActivationContext;

type CheckFn = dyn Fn(&ActivationContext) -> Result<(), String> + Send + Sync;

/// A named, type-erased availability check.
///
/// Returns `Ok(())` when the service may be activated, or `Err(reason)`.
#[derive(Clone)]
pub struct ActivationPredicate {
    name: Arc<str>,
    check: Arc<CheckFn>,
}

impl ActivationPredicate {
    /// Creates a predicate from a closure returning an unavailability reason.
    pub fn custom<F>(name: impl Into<Arc<str>>, check: F) -> Self
    where
        F: Fn(&ActivationContext) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// Passes only when the active profile equals `profile`.
    pub fn profile(profile: impl Into<String>) -> Self {
        let profile = profile.into();
        Self::custom(format!("profile == {profile}"), move |ctx| {
            match ctx.profile() {
                Some(active) if active == profile => Ok(()),
                Some(active) => Err(format!(
                    "requires profile '{profile}', active profile is '{active}'"
                )),
                None => Err(format!("requires profile '{profile}', no profile is active")),
            }
        })
    }

    /// Passes only when `key` is present in the context.
    pub fn property_present(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::custom(format!("has {key}"), move |ctx| {
            if ctx.contains(&key) {
                Ok(())
            } else {
                Err(format!("property '{key}' is not set"))
            }
        })
    }

    /// Passes only when `key` is present and equal to `expected`.
    pub fn property_equals(key: impl Into<String>, expected: impl Into<Value>) -> Self {
        let key = key.into();
        let expected = expected.into();
        Self::custom(format!("{key} == {expected}"), move |ctx| match ctx.get(&key) {
            Some(actual) if *actual == expected => Ok(()),
            Some(actual) => Err(format!(
                "property '{key}' is {actual}, expected {expected}"
            )),
            None => Err(format!("property '{key}' is not set")),
        })
    }

    /// Passes only when `key` holds the boolean `true`.
    pub fn flag(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::custom(format!("{key} enabled"), move |ctx| {
            match ctx.get(&key).and_then(Value::as_bool) {
                Some(true) => Ok(()),
                _ => Err(format!("'{key}' is not enabled")),
            }
        })
    }

    /// Inverts `inner`.
    pub fn not(inner: ActivationPredicate) -> Self {
        let name = format!("not({})", inner.name);
        Self::custom(name.clone(), move |ctx| match inner.evaluate(ctx) {
            Ok(()) => Err(format!("{name} failed")),
            Err(_) => Ok(()),
        })
    }

    /// The predicate's display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluates the predicate.
    pub fn evaluate(&self, ctx: &ActivationContext) -> Result<(), String> {
        (self.check)(ctx)
    }
}

impl fmt::Debug for ActivationPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ActivationPredicate").field(&self.name).finish()
    }
}

/// Evaluates predicates in order and returns the first failure reason.
pub(crate) fn evaluate_all(
    predicates: &[ActivationPredicate],
    ctx: &ActivationContext,
) -> Result<(), String> {
    predicates.iter().try_for_each(|p| p.evaluate(ctx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_predicate() {
        let dev = ActivationPredicate::profile("dev");

        assert!(dev.evaluate(&ActivationContext::new().with_profile("dev")).is_ok());

        let err = dev
            .evaluate(&ActivationContext::new().with_profile("prod"))
            .unwrap_err();
        assert!(err.contains("prod"));

        assert!(dev.evaluate(&ActivationContext::new()).is_err());
    }

    #[test]
    fn test_property_predicates() {
        let ctx = ActivationContext::new().with("db", "postgres").with("cache", true);

        assert!(ActivationPredicate::property_present("db").evaluate(&ctx).is_ok());
        assert!(ActivationPredicate::property_present("queue").evaluate(&ctx).is_err());
        assert!(
            ActivationPredicate::property_equals("db", "postgres")
                .evaluate(&ctx)
                .is_ok()
        );
        assert!(
            ActivationPredicate::property_equals("db", "sqlite")
                .evaluate(&ctx)
                .is_err()
        );
        assert!(ActivationPredicate::flag("cache").evaluate(&ctx).is_ok());
        assert!(ActivationPredicate::flag("db").evaluate(&ctx).is_err());
    }

    #[test]
    fn test_not_predicate() {
        let not_dev = ActivationPredicate::not(ActivationPredicate::profile("dev"));
        assert!(not_dev.evaluate(&ActivationContext::new().with_profile("prod")).is_ok());
        assert!(not_dev.evaluate(&ActivationContext::new().with_profile("dev")).is_err());
    }

    #[test]
    fn test_evaluate_all_reports_first_failure() {
        let predicates = vec![
            ActivationPredicate::custom("first", |_| Err("first failed".to_string())),
            ActivationPredicate::custom("second", |_| Err("second failed".to_string())),
        ];
        let err = evaluate_all(&predicates, &ActivationContext::new()).unwrap_err();
        assert_eq!(err, "first failed");

        assert!(evaluate_all(&[], &ActivationContext::new()).is_ok());
    }
}
