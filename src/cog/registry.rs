//! Live cogs of a server, one per name.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;

use crate::cog::BoundCog;
use crate::observability::metrics;
use crate::routing::{RouteError, Router};

#[derive(Debug, Error)]
pub enum CogError {
    #[error("a cog named `{name}` is already loaded")]
    AlreadyLoaded { name: String },

    #[error("failed to inject cog `{name}`: {source}")]
    Inject {
        name: String,
        #[source]
        source: RouteError,
    },
}

#[derive(Default)]
pub struct CogRegistry {
    live: DashMap<String, BoundCog>,
}

impl CogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject `cog` into `router` and remember it.
    ///
    /// A failed injection leaves both the router and the registry unchanged.
    pub fn load(&self, cog: BoundCog, router: &Router) -> Result<(), CogError> {
        let name = cog.name();
        match self.live.entry(name.to_string()) {
            Entry::Occupied(_) => {
                metrics::record_cog_event(name, "load_failed");
                Err(CogError::AlreadyLoaded { name: name.to_string() })
            }
            Entry::Vacant(slot) => {
                if let Err(source) = cog.inject(router) {
                    metrics::record_cog_event(name, "load_failed");
                    return Err(CogError::Inject {
                        name: name.to_string(),
                        source,
                    });
                }
                tracing::info!(cog = name, routes = cog.routes().len(), "Cog loaded");
                metrics::record_cog_event(name, "loaded");
                slot.insert(cog);
                Ok(())
            }
        }
    }

    /// Eject and forget the cog called `name`. Returns whether it was loaded.
    pub fn unload(&self, name: &str, router: &Router) -> bool {
        match self.live.remove(name) {
            Some((_, cog)) => {
                cog.eject(router);
                tracing::info!(cog = name, "Cog unloaded");
                metrics::record_cog_event(name, "unloaded");
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.live.contains_key(name)
    }

    /// The live cog called `name`.
    pub fn get(&self, name: &str) -> Option<BoundCog> {
        self.live.get(name).map(|cog| cog.value().clone())
    }

    /// Names of live cogs, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.live.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cog::{Cog, RouteDecl};
    use crate::dispatch::Context;
    use crate::http::Method;
    use std::sync::Arc;

    struct Hello;

    impl Cog for Hello {
        const NAME: &'static str = "hello";

        fn routes() -> Vec<RouteDecl<Self>> {
            vec![RouteDecl::new("/hello", Method::Get, "hello", |_cog: Arc<Self>, _ctx| async move {
                Ok(Context::respond("hi"))
            })]
        }
    }

    #[test]
    fn test_one_live_cog_per_name() {
        let router = Router::default();
        let registry = CogRegistry::new();

        registry.load(BoundCog::new(Hello), &router).unwrap();
        let err = registry.load(BoundCog::new(Hello), &router).unwrap_err();
        assert!(matches!(err, CogError::AlreadyLoaded { ref name } if name == "hello"));
        assert_eq!(registry.names(), vec!["hello"]);
        assert_eq!(router.list_routes(), vec!["/hello"]);
    }

    #[test]
    fn test_unload_then_reload() {
        let router = Router::default();
        let registry = CogRegistry::new();

        registry.load(BoundCog::new(Hello), &router).unwrap();
        assert!(registry.unload("hello", &router));
        assert!(!registry.unload("hello", &router));
        assert!(router.list_routes().is_empty());
        assert!(!registry.contains("hello"));

        registry.load(BoundCog::new(Hello), &router).unwrap();
        assert!(registry.get("hello").is_some());
    }

    #[test]
    fn test_failed_inject_is_not_registered() {
        let router = Router::default();
        let registry = CogRegistry::new();
        let squatter = crate::routing::Handler::new("squatter", |_ctx: Context| async move {
            Ok(Context::respond("x"))
        });
        router.add_handler("/hello", Method::Get, squatter).unwrap();

        let err = registry.load(BoundCog::new(Hello), &router).unwrap_err();
        assert!(matches!(err, CogError::Inject { .. }));
        assert!(!registry.contains("hello"));
    }
}
