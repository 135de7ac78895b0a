//! Name → host class lookup

use std::sync::Arc;

use corvid_sdk::{BridgeError, BridgeResult};
use dashmap::DashMap;

use super::class::HostClass;

/// Thread-safe registry of host classes by guest-visible name.
pub struct TypeRegistry {
    classes: DashMap<String, Arc<HostClass>>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            classes: DashMap::new(),
        }
    }

    /// Register a class under its own name, replacing any previous entry.
    pub fn register(&self, class: Arc<HostClass>) {
        self.classes.insert(class.name().to_string(), class);
    }

    /// Look up a class by name.
    pub fn get(&self, name: &str) -> Option<Arc<HostClass>> {
        self.classes.get(name).map(|entry| entry.value().clone())
    }

    /// Look up a class by name, failing with a configuration error.
    pub fn resolve(&self, name: &str) -> BridgeResult<Arc<HostClass>> {
        self.get(name)
            .ok_or_else(|| BridgeError::TypeNotFound(name.to_string()))
    }

    /// Check if a class is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Number of registered classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
