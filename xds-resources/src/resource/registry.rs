//! Registry mapping type URLs to resource decoders.

use std::collections::HashMap;
use std::sync::Arc;

use super::ResourceType;

/// The set of resource types a client understands, keyed by type URL.
///
/// The registry is populated during single-threaded startup and read-only
/// afterwards, so lookups need no synchronization. A type URL that is absent
/// means the resource type is unknown to this client; the transport layer
/// must report that upstream rather than silently dropping the resource.
#[derive(Default)]
pub struct ResourceTypeRegistry {
    types: HashMap<&'static str, Arc<dyn ResourceType>>,
}

impl ResourceTypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource type under both its current and legacy type URLs.
    ///
    /// # Panics
    ///
    /// Panics if either URL is already registered. Duplicate registration is
    /// a startup-time programming error, not a runtime condition.
    pub fn register(&mut self, resource_type: impl ResourceType) {
        let resource_type: Arc<dyn ResourceType> = Arc::new(resource_type);
        for type_url in [resource_type.type_url(), resource_type.v2_type_url()] {
            if self
                .types
                .insert(type_url, resource_type.clone())
                .is_some()
            {
                panic!("resource type {type_url} registered more than once");
            }
        }
    }

    /// Looks up the decoder for a type URL (current or legacy).
    pub fn lookup(&self, type_url: &str) -> Option<Arc<dyn ResourceType>> {
        self.types.get(type_url).cloned()
    }
}
