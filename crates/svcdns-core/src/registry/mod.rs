//! Plugin-based backend registry
//!
//! The registry allows service directories and zone stores to be registered
//! dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use svcdns_core::registry::BackendRegistry;
//!
//! let registry = BackendRegistry::new();
//! svcdns_zone_routeros::register(&registry);
//! svcdns_directory_nomad::register(&registry);
//!
//! let directory = registry.create_directory(&config.directory)?;
//! let store = registry.create_zone_store(&config.zone_store)?;
//! ```
//!
//! ## Registration
//!
//! Backend crates expose a `register()` function:
//!
//! ```rust,ignore
//! pub fn register(registry: &BackendRegistry) {
//!     registry.register_zone_store("routeros", Box::new(RouterOsFactory));
//! }
//! ```

use crate::config::{DirectoryConfig, ZoneStoreConfig};
use crate::error::{Error, Result};
use crate::traits::{ServiceDirectory, ServiceDirectoryFactory, ZoneStore, ZoneStoreFactory};
use crate::zone::MemoryZoneStoreFactory;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Registry mapping backend type names to factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct BackendRegistry {
    /// Registered service directory factories
    directories: RwLock<HashMap<String, Box<dyn ServiceDirectoryFactory>>>,

    /// Registered zone store factories
    zone_stores: RwLock<HashMap<String, Box<dyn ZoneStoreFactory>>>,
}

impl BackendRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the in-core backends (the memory zone store) registered
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_zone_store("memory", Box::new(MemoryZoneStoreFactory));
        registry
    }

    /// Register a service directory factory
    ///
    /// # Parameters
    ///
    /// - `name`: Directory type name (e.g., "nomad")
    /// - `factory`: Factory object for creating directory instances
    pub fn register_directory(
        &self,
        name: impl Into<String>,
        factory: Box<dyn ServiceDirectoryFactory>,
    ) {
        let mut directories = self
            .directories
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        directories.insert(name.into(), factory);
    }

    /// Register a zone store factory
    ///
    /// # Parameters
    ///
    /// - `name`: Zone store type name (e.g., "routeros", "memory")
    /// - `factory`: Factory object for creating zone store instances
    pub fn register_zone_store(&self, name: impl Into<String>, factory: Box<dyn ZoneStoreFactory>) {
        let mut stores = self
            .zone_stores
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        stores.insert(name.into(), factory);
    }

    /// Create a service directory from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn ServiceDirectory>)`: Created directory instance
    /// - `Err(Error)`: If the directory type is not registered or creation fails
    pub fn create_directory(&self, config: &DirectoryConfig) -> Result<Box<dyn ServiceDirectory>> {
        let directory_type = config.type_name();
        let directories = self
            .directories
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let Some(factory) = directories.get(directory_type) else {
            drop(directories);
            return Err(Error::config(format!(
                "Unknown directory type '{}'. Registered: {}",
                directory_type,
                self.list_directories().join(", ")
            )));
        };

        factory.create(config)
    }

    /// Create a zone store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn ZoneStore>)`: Created zone store instance
    /// - `Err(Error)`: If the store type is not registered or creation fails
    pub fn create_zone_store(&self, config: &ZoneStoreConfig) -> Result<Box<dyn ZoneStore>> {
        let store_type = config.type_name();
        let stores = self
            .zone_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let Some(factory) = stores.get(store_type) else {
            drop(stores);
            return Err(Error::config(format!(
                "Unknown zone store type '{}'. Registered: {}",
                store_type,
                self.list_zone_stores().join(", ")
            )));
        };

        factory.create(config)
    }

    /// List all registered directory types, sorted
    pub fn list_directories(&self) -> Vec<String> {
        let directories = self
            .directories
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = directories.keys().cloned().collect();
        names.sort();
        names
    }

    /// List all registered zone store types, sorted
    pub fn list_zone_stores(&self) -> Vec<String> {
        let stores = self
            .zone_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = stores.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a directory type is registered
    pub fn has_directory(&self, name: &str) -> bool {
        let directories = self
            .directories
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        directories.contains_key(name)
    }

    /// Check if a zone store type is registered
    pub fn has_zone_store(&self, name: &str) -> bool {
        let stores = self
            .zone_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        stores.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockDirectoryFactory;

    impl ServiceDirectoryFactory for MockDirectoryFactory {
        fn create(&self, _config: &DirectoryConfig) -> Result<Box<dyn ServiceDirectory>> {
            Err(Error::directory("Mock directory not implemented"))
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = BackendRegistry::new();

        assert!(!registry.has_directory("mock"));

        registry.register_directory("mock", Box::new(MockDirectoryFactory));

        assert!(registry.has_directory("mock"));
        assert!(registry.list_directories().contains(&"mock".to_string()));
    }

    #[test]
    fn test_builtins_include_memory_store() {
        let registry = BackendRegistry::with_builtins();
        assert!(registry.has_zone_store("memory"));

        let store = registry.create_zone_store(&ZoneStoreConfig::Memory).unwrap();
        assert_eq!(store.store_name(), "memory");
    }

    #[test]
    fn test_unknown_backend_is_config_error() {
        let registry = BackendRegistry::new();

        let result = registry.create_directory(&DirectoryConfig::default());
        assert!(matches!(result, Err(Error::Config(_))));

        let result = registry.create_zone_store(&ZoneStoreConfig::Memory);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_backend_names_registered_types() {
        let registry = BackendRegistry::with_builtins();
        registry.register_directory("mock", Box::new(MockDirectoryFactory));

        let config = ZoneStoreConfig::Custom {
            factory: "powerdns".to_string(),
            config: serde_json::json!({"url": "http://pdns"}),
        };
        let err = registry.create_zone_store(&config).err().unwrap();
        let msg = err.to_string();
        assert!(msg.contains("'powerdns'"));
        assert!(msg.contains("Registered: memory"));

        let err = registry.create_directory(&DirectoryConfig::default()).err().unwrap();
        assert!(err.to_string().contains("Registered: mock"));
    }
}
