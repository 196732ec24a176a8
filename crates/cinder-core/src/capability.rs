//! Capability identifiers.
//!
//! A [`Capability`] names a contract a service can satisfy.  Capabilities are
//! keyed by the [`TypeId`] of the contract type, which is usually a trait
//! object (`dyn Greeter`) but may also be a concrete type: every descriptor
//! automatically provides its own concrete type as a capability.
//!
//! ```rust,ignore
//! let greeter = Capability::of::<dyn Greeter>();
//! assert_eq!(greeter.name(), "dyn my_crate::Greeter");
//! ```

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifier of a contract (interface) a service can fulfil.
///
/// Equality and hashing only consider the type id; the name is carried for
/// logs and error messages.
#[derive(Clone, Copy)]
pub struct Capability {
    type_id: TypeId,
    name: &'static str,
}

impl Capability {
    /// Returns the capability for the contract type `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The `TypeId` of the contract type.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Human-readable contract type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if this capability is the contract type `T`.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl PartialEq for Capability {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for Capability {}

impl Hash for Capability {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capability({})", self.name)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    trait Greeter {}
    struct English;

    #[test]
    fn test_capability_identity() {
        assert_eq!(Capability::of::<dyn Greeter>(), Capability::of::<dyn Greeter>());
        assert_ne!(Capability::of::<dyn Greeter>(), Capability::of::<English>());
        assert!(Capability::of::<English>().is::<English>());
    }

    #[test]
    fn test_capability_hash_set() {
        let mut set = HashSet::new();
        set.insert(Capability::of::<dyn Greeter>());
        set.insert(Capability::of::<dyn Greeter>());
        set.insert(Capability::of::<English>());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_capability_name() {
        let cap = Capability::of::<English>();
        assert!(cap.name().ends_with("English"));
        assert_eq!(cap.to_string(), cap.name());
    }
}
