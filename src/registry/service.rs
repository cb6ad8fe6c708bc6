//! The service registry.
//!
//! Services are process-wide singletons with a two-phase lifecycle: all
//! services are registered first, then `initialize_all` runs each `initialize`
//! exactly once in registration order. Typed accessors downcast the stored
//! trait object and report missing or mistyped services as
//! `ServiceNotAvailable`.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::RwLock;

use crate::error::{NeuroError, Result};

/// A named, process-wide service.
///
/// Services own their state exclusively and expose it only through methods;
/// interior mutability keeps all methods `&self`.
pub trait Service: Send + Sync + 'static {
    /// The unique service name.
    fn name(&self) -> &str;

    /// One-time initialization, invoked by `ServiceRegistry::initialize_all`.
    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Optional teardown. Most services have nothing to release.
    fn cleanup(&self) -> Result<()> {
        Ok(())
    }

    /// Downcast hook for the typed global accessors.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl std::fmt::Debug for dyn Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service").field("name", &self.name()).finish()
    }
}

/// Name → service mapping with two-phase initialization.
pub struct ServiceRegistry {
    services: RwLock<HashMap<String, Arc<dyn Service>>>,
    order: RwLock<Vec<String>>,
    initialized: RwLock<bool>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            services: RwLock::new(HashMap::new()),
            order: RwLock::new(Vec::new()),
            initialized: RwLock::new(false),
        }
    }

    /// Registers a service. Must happen before `initialize_all`.
    pub fn register_service(&self, svc: Arc<dyn Service>) -> Result<()> {
        if *self.initialized.read() {
            return Err(NeuroError::DuplicateService(format!(
                "cannot register '{}' after initialization",
                svc.name()
            )));
        }
        let name = svc.name().to_string();
        if name.is_empty() {
            return Err(NeuroError::DuplicateService(
                "service name cannot be empty".to_string(),
            ));
        }
        let mut services = self.services.write();
        if services.contains_key(&name) {
            return Err(NeuroError::DuplicateService(name));
        }
        services.insert(name.clone(), svc);
        self.order.write().push(name);
        Ok(())
    }

    /// Initializes every registered service in registration order.
    ///
    /// The first failure aborts initialization and is returned; services that
    /// already initialized are not rolled back.
    pub fn initialize_all(&self) -> Result<()> {
        let order = self.order.read().clone();
        for name in order {
            let svc = self
                .services
                .read()
                .get(&name)
                .cloned()
                .ok_or_else(|| NeuroError::service_not_available(name.clone()))?;
            tracing::debug!(service = %name, "Initializing service");
            svc.initialize()?;
        }
        *self.initialized.write() = true;
        Ok(())
    }

    /// Looks up a service by name.
    pub fn get_service(&self, name: &str) -> Result<Arc<dyn Service>> {
        self.services
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| NeuroError::service_not_available(name))
    }

    /// Returns all registered service names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.read().clone()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static! {
    static ref GLOBAL_SERVICES: RwLock<Arc<ServiceRegistry>> =
        RwLock::new(Arc::new(ServiceRegistry::new()));
}

/// Returns the global service registry.
pub fn global_service_registry() -> Arc<ServiceRegistry> {
    GLOBAL_SERVICES.read().clone()
}

/// Swaps the global service registry, returning the previous one.
///
/// Used by tests to isolate service state.
pub fn set_global_service_registry(registry: Arc<ServiceRegistry>) -> Arc<ServiceRegistry> {
    std::mem::replace(&mut *GLOBAL_SERVICES.write(), registry)
}

/// Fetches a service from the global registry and downcasts it to its
/// concrete type. A mistyped or missing entry is `ServiceNotAvailable`.
pub fn get_typed_service<T: Service>(name: &str) -> Result<Arc<T>> {
    let svc = global_service_registry().get_service(name)?;
    svc.as_any()
        .downcast::<T>()
        .map_err(|_| NeuroError::service_not_available(name))
}
