//! Long-lived services shared by every request.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     ServiceRegistry (name → factory, declaration order)
//!     → build(extensions): each factory sees the extensions and the services
//!       built before it
//!     → ServiceMap (immutable, shared via Arc)
//!
//! Per request:
//!     ServiceMap → Context::service::<S>(name)
//!     ServiceMap::auth_services() → dispatch::gate
//! ```
//!
//! # Design Decisions
//! - Declaration order is the only dependency ordering; no cycle detection
//! - Names are unique; a clash fails startup
//! - A service opts into the auth gate by returning itself from `Service::auth`

pub mod auth;
pub mod jwt;
pub mod token;

use std::any::Any;
use std::sync::Arc;

use thiserror::Error;

use crate::extensions::ExtensionMap;

pub use auth::AuthService;
pub use jwt::{JwtService, TokenInvalid};
pub use token::TokenValidator;

/// Error type factories may fail with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while assembling services and extensions.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A service or extension name is already taken.
    #[error("{kind} `{name}` is already registered")]
    DuplicateName { kind: &'static str, name: String },

    /// A service factory failed.
    #[error("failed to construct service `{name}`: {source}")]
    Factory {
        name: String,
        #[source]
        source: BoxError,
    },
}

/// A capability object constructed once per server.
///
/// Services with mutable state synchronize internally; the map that holds them
/// is shared read-only across requests.
pub trait Service: Send + Sync + 'static {
    /// Return `Some(self)` to take part in request authorization.
    fn auth(self: Arc<Self>) -> Option<Arc<dyn AuthService>> {
        None
    }
}

struct ServiceEntry {
    name: String,
    service: Arc<dyn Any + Send + Sync>,
    auth: Option<Arc<dyn AuthService>>,
}

/// Named services in registration order.
#[derive(Default)]
pub struct ServiceMap {
    entries: Vec<ServiceEntry>,
}

impl std::fmt::Debug for ServiceMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|e| &e.name)).finish()
    }
}

impl ServiceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a service under `name`.
    pub fn insert<S: Service>(&mut self, name: impl Into<String>, service: S) -> Result<(), ServiceError> {
        self.insert_arc(name, Arc::new(service))
    }

    /// Add an already shared service under `name`.
    pub fn insert_arc<S: Service>(&mut self, name: impl Into<String>, service: Arc<S>) -> Result<(), ServiceError> {
        let name = name.into();
        if self.contains(&name) {
            return Err(ServiceError::DuplicateName { kind: "service", name });
        }
        let auth = Arc::clone(&service).auth();
        self.entries.push(ServiceEntry { name, service, auth });
        Ok(())
    }

    /// The service called `name`, if it has type `S`.
    pub fn get<S: Service>(&self, name: &str) -> Option<Arc<S>> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .and_then(|e| Arc::clone(&e.service).downcast::<S>().ok())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Whether `name` is registered and auth-capable.
    pub fn is_auth(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name && e.auth.is_some())
    }

    /// Auth-capable services in registration order.
    pub fn auth_services(&self) -> Vec<Arc<dyn AuthService>> {
        self.entries.iter().filter_map(|e| e.auth.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

type Factory = Box<dyn FnOnce(&ExtensionMap, &mut ServiceMap, &str) -> Result<(), ServiceError> + Send>;

/// Service factories waiting to be built, in declaration order.
#[derive(Default)]
pub struct ServiceRegistry {
    factories: Vec<(String, Factory)>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a service. Construction arguments are captured by `factory`.
    pub fn register<S, F>(&mut self, name: impl Into<String>, factory: F)
    where
        S: Service,
        F: FnOnce(&ExtensionMap, &ServiceMap) -> Result<S, BoxError> + Send + 'static,
    {
        let factory: Factory = Box::new(move |extensions, services, name| {
            let service = factory(extensions, services).map_err(|source| ServiceError::Factory {
                name: name.to_string(),
                source,
            })?;
            services.insert(name, service)
        });
        self.factories.push((name.into(), factory));
    }

    /// Whether a factory is declared under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.iter().any(|(n, _)| n == name)
    }

    /// Build every service in declaration order.
    pub fn build(self, extensions: &ExtensionMap) -> Result<ServiceMap, ServiceError> {
        let mut services = ServiceMap::new();
        for (name, factory) in self.factories {
            if services.contains(&name) {
                return Err(ServiceError::DuplicateName { kind: "service", name });
            }
            factory(extensions, &mut services, &name)?;
            tracing::debug!(service = %name, auth = services.is_auth(&name), "Service constructed");
        }
        Ok(services)
    }
}
