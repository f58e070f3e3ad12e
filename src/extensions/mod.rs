//! Long-running background tasks started with the server.
//!
//! # Data Flow
//! ```text
//! HttpServerBuilder::extension(name, E) → ExtensionMap (declaration order)
//!     → services are built with access to the map
//!     → server start: every Extension::run(services, extensions) on its own task
//!     → server exit: every Extension::stop() concurrently
//! ```
//!
//! # Design Decisions
//! - `stop` only signals; the task winds down on its own
//! - Extensions are reachable from handlers by name and concrete type

pub mod heartbeat;

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

use crate::services::{ServiceError, ServiceMap};

pub use heartbeat::Heartbeat;

/// A background task owned by the server.
#[async_trait]
pub trait Extension: Send + Sync + 'static {
    /// Body of the task. Returns when the work is done or `stop` was called.
    async fn run(&self, services: Arc<ServiceMap>, extensions: Arc<ExtensionMap>);

    /// Ask the task to finish. Must be idempotent.
    async fn stop(&self);
}

struct ExtensionEntry {
    name: String,
    any: Arc<dyn Any + Send + Sync>,
    extension: Arc<dyn Extension>,
}

/// Named extensions in declaration order.
#[derive(Default)]
pub struct ExtensionMap {
    entries: Vec<ExtensionEntry>,
}

impl ExtensionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<E: Extension>(&mut self, name: impl Into<String>, extension: E) -> Result<(), ServiceError> {
        let name = name.into();
        if self.contains(&name) {
            return Err(ServiceError::DuplicateName { kind: "extension", name });
        }
        let extension = Arc::new(extension);
        self.entries.push(ExtensionEntry {
            name,
            any: Arc::clone(&extension) as Arc<dyn Any + Send + Sync>,
            extension,
        });
        Ok(())
    }

    /// The extension called `name`, if it has type `E`.
    pub fn get<E: Extension>(&self, name: &str) -> Option<Arc<E>> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .and_then(|e| Arc::clone(&e.any).downcast::<E>().ok())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Every extension with its name, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Extension>)> {
        self.entries.iter().map(|e| (e.name.as_str(), &e.extension))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
