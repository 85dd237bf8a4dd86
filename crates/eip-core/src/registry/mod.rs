//! Plugin-based component registry
//!
//! Controllers, probes and stores register factories under a type name;
//! configuration picks one by name. Nothing here knows the concrete
//! implementations beyond the built-in ones.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use eip_core::registry::ComponentRegistry;
//!
//! let registry = ComponentRegistry::with_builtins();
//! eip_controller_openstack::register(&registry);
//! eip_probe_http::register(&registry);
//!
//! let parts = registry.build_parts(&config).await?;
//! let (service, events) = AddressService::new(parts, &config)?;
//! ```
//!
//! ## Registration
//!
//! Implementation crates expose a `register` function:
//!
//! ```rust,ignore
//! pub fn register(registry: &ComponentRegistry) {
//!     registry.register_probe("http", Box::new(HttpProbeFactory));
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::backend::BackendParts;
use crate::config::{BackendKind, ControllerConfig, EipConfig, ProbeConfig, StoreConfig};
use crate::error::{Error, Result};
use crate::probe::StaticProbeFactory;
use crate::store::{FileAddressStoreFactory, MemoryAddressStoreFactory};
use crate::traits::{
    AddressStore, AddressStoreFactory, LegacyComputeClient, LegacyComputeFactory, LivenessProbe,
    LivenessProbeFactory, NetworkController, NetworkControllerFactory,
};

/// Registry of component factories
///
/// ## Thread Safety
///
/// Interior mutability with RwLock: concurrent reads, exclusive writes.
#[derive(Default)]
pub struct ComponentRegistry {
    controllers: RwLock<HashMap<String, Box<dyn NetworkControllerFactory>>>,
    legacy_clients: RwLock<HashMap<String, Box<dyn LegacyComputeFactory>>>,
    probes: RwLock<HashMap<String, Box<dyn LivenessProbeFactory>>>,
    stores: RwLock<HashMap<String, Arc<dyn AddressStoreFactory>>>,
}

impl ComponentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the in-crate stores and the static probe
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_store("memory", Box::new(MemoryAddressStoreFactory));
        registry.register_store("file", Box::new(FileAddressStoreFactory));
        registry.register_probe("static", Box::new(StaticProbeFactory));
        registry
    }

    /// Register an overlay controller factory
    pub fn register_controller(
        &self,
        name: impl Into<String>,
        factory: Box<dyn NetworkControllerFactory>,
    ) {
        let mut controllers = self
            .controllers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        controllers.insert(name.into(), factory);
    }

    /// Register a legacy compute client factory
    pub fn register_legacy_client(
        &self,
        name: impl Into<String>,
        factory: Box<dyn LegacyComputeFactory>,
    ) {
        let mut clients = self
            .legacy_clients
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        clients.insert(name.into(), factory);
    }

    /// Register a liveness probe factory
    pub fn register_probe(&self, name: impl Into<String>, factory: Box<dyn LivenessProbeFactory>) {
        let mut probes = self.probes.write().unwrap_or_else(PoisonError::into_inner);
        probes.insert(name.into(), factory);
    }

    /// Register an address store factory
    pub fn register_store(&self, name: impl Into<String>, factory: Box<dyn AddressStoreFactory>) {
        let mut stores = self.stores.write().unwrap_or_else(PoisonError::into_inner);
        stores.insert(name.into(), Arc::from(factory));
    }

    /// Create an overlay controller from configuration
    pub fn create_controller(&self, config: &ControllerConfig) -> Result<Arc<dyn NetworkController>> {
        let name = config.type_name();
        let controllers = self
            .controllers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let factory = controllers
            .get(name)
            .ok_or_else(|| Error::config(format!("Unknown controller type: {}", name)))?;
        factory.create(config)
    }

    /// Create a legacy compute client from configuration
    pub fn create_legacy_client(
        &self,
        config: &ControllerConfig,
    ) -> Result<Arc<dyn LegacyComputeClient>> {
        let name = config.type_name();
        let clients = self
            .legacy_clients
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let factory = clients
            .get(name)
            .ok_or_else(|| Error::config(format!("Unknown legacy compute type: {}", name)))?;
        factory.create(config)
    }

    /// Create a liveness probe from configuration
    pub fn create_probe(&self, config: &ProbeConfig) -> Result<Arc<dyn LivenessProbe>> {
        let name = config.type_name();
        let probes = self.probes.read().unwrap_or_else(PoisonError::into_inner);
        let factory = probes
            .get(name)
            .ok_or_else(|| Error::config(format!("Unknown probe type: {}", name)))?;
        factory.create(config)
    }

    /// Create an address store from configuration
    pub async fn create_store(&self, config: &StoreConfig) -> Result<Arc<dyn AddressStore>> {
        let name = config.type_name();
        let factory = {
            let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
            stores
                .get(name)
                .cloned()
                .ok_or_else(|| Error::config(format!("Unknown store type: {}", name)))?
        };

        // Lock released before the async create
        factory.create(config).await
    }

    /// Create every collaborator a service needs
    ///
    /// The overlay controller is only created for overlay deployments.
    pub async fn build_parts(&self, config: &EipConfig) -> Result<BackendParts> {
        let controller = match config.backend {
            BackendKind::Overlay => Some(self.create_controller(&config.controller)?),
            BackendKind::Legacy => None,
        };

        Ok(BackendParts {
            controller,
            legacy: self.create_legacy_client(&config.controller)?,
            resolver: None,
            store: self.create_store(&config.store).await?,
            probe: self.create_probe(&config.probe)?,
        })
    }

    /// Registered controller types
    pub fn list_controllers(&self) -> Vec<String> {
        let controllers = self
            .controllers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        controllers.keys().cloned().collect()
    }

    /// Registered probe types
    pub fn list_probes(&self) -> Vec<String> {
        let probes = self.probes.read().unwrap_or_else(PoisonError::into_inner);
        probes.keys().cloned().collect()
    }

    /// Registered store types
    pub fn list_stores(&self) -> Vec<String> {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.keys().cloned().collect()
    }

    /// Check if a controller type is registered
    pub fn has_controller(&self, name: &str) -> bool {
        let controllers = self
            .controllers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        controllers.contains_key(name)
    }

    /// Check if a probe type is registered
    pub fn has_probe(&self, name: &str) -> bool {
        let probes = self.probes.read().unwrap_or_else(PoisonError::into_inner);
        probes.contains_key(name)
    }

    /// Check if a store type is registered
    pub fn has_store(&self, name: &str) -> bool {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.contains_key(name)
    }
}
