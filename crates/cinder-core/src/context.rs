//! Activation context evaluated by service predicates.
//!
//! The container treats the context as an opaque key/value set supplied by
//! the host (usually built from the `services` section of the runtime
//! configuration).  Two things are read from it:
//!
//! - the **active profile** (`"profile"` key), used by
//!   [`ActivationPredicate::profile`](crate::ActivationPredicate::profile);
//! - arbitrary **properties**, which predicates can test and recipes can
//!   deserialise into typed settings via [`get_as`](ActivationContext::get_as).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

/// Key under which the active profile name is stored.
pub const PROFILE_KEY: &str = "profile";

/// Opaque key/value set used to evaluate activation predicates.
///
/// Cheap to clone: the map is shared behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct ActivationContext {
    values: Arc<HashMap<String, Value>>,
}

impl ActivationContext {
    /// Creates an empty context (no profile, no properties).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context from an existing property map.
    pub fn from_map(values: HashMap<String, Value>) -> Self {
        Self {
            values: Arc::new(values),
        }
    }

    /// Returns a copy of this context with `key` set to `value`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        Arc::make_mut(&mut self.values).insert(key.into(), value.into());
        self
    }

    /// Returns a copy of this context with the active profile set.
    pub fn with_profile(self, profile: impl Into<String>) -> Self {
        self.with(PROFILE_KEY, profile.into())
    }

    /// The active profile, if one is set and is a string.
    pub fn profile(&self) -> Option<&str> {
        self.values.get(PROFILE_KEY).and_then(Value::as_str)
    }

    /// Raw value for `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns `true` if `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Deserialises the value under `key` into `T`.
    ///
    /// Returns `None` when the key is absent and `Some(Err(_))` when the value
    /// has the wrong shape.
    pub fn get_as<T>(&self, key: &str) -> Option<serde_json::Result<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        self.values.get(key).map(T::deserialize)
    }

    /// Iterates over all keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}
