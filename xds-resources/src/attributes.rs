//! A typed attribute bag attached to addresses and endpoints.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Ensures only types that support comparison can be inserted into the
/// Attributes struct. This allows the use of value-based equality rather than
/// relying on pointer comparisons.
trait AttributeValueTrait: Any + Send + Sync + Debug {
    fn any_ref(&self) -> &dyn Any;
    fn dyn_eq(&self, other: &dyn AttributeValueTrait) -> bool;
}

impl<T: Any + Send + Sync + Eq + Debug> AttributeValueTrait for T {
    fn any_ref(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn AttributeValueTrait) -> bool {
        other
            .any_ref()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }
}

#[derive(Clone, Debug)]
struct AttributeValue(Arc<dyn AttributeValueTrait>);

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        self.0.dyn_eq(other.0.as_ref())
    }
}

impl Eq for AttributeValue {}

/// A collection of attributes indexed by their type.
///
/// `Attributes` provides a map-like interface where values are keyed by their
/// `TypeId`. Equality is structural: two maps are equal if they contain the
/// same set of values, compared by value, regardless of where the values are
/// allocated. Stored types must implement `Any + Send + Sync + Eq + Debug`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attributes {
    map: HashMap<TypeId, AttributeValue>,
}

impl Attributes {
    /// Creates an empty attribute bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value, replacing any existing value of the same type.
    pub fn add<T: Any + Send + Sync + Eq + Debug>(mut self, value: T) -> Self {
        self.map
            .insert(TypeId::of::<T>(), AttributeValue(Arc::new(value)));
        self
    }

    /// Gets a reference to the value of type `T`, if one is present.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.0.any_ref().downcast_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_by_type() {
        let attributes = Attributes::new().add(42i32).add("hello".to_string());
        assert_eq!(attributes.get::<i32>(), Some(&42));
        assert_eq!(attributes.get::<String>(), Some(&"hello".to_string()));
        assert_eq!(attributes.get::<bool>(), None);
    }

    #[test]
    fn test_add_replaces_same_type() {
        let attributes = Attributes::new().add(1i32).add(2i32);
        assert_eq!(attributes.get::<i32>(), Some(&2));
    }

    #[test]
    fn test_structural_equality() {
        let a = Attributes::new().add(10i32);
        let b = Attributes::new().add(10i32);
        let c = Attributes::new().add(10i32).add("foo".to_string());
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, Attributes::new().add(11i32));
    }
}
