//! Cogs: named groups of routes owned by one instance.
//!
//! # Data Flow
//! ```text
//! impl Cog for Accounts { fn routes() -> Vec<RouteDecl<Self>> }   (pure data)
//!     → BoundCog::new(Accounts { .. })   each handler captures Arc<Accounts>
//!     → inject(router)                   one router transaction, all or nothing
//!     → eject(router)                    one router transaction, only our own handlers
//! ```
//!
//! # Design Decisions
//! - Declaration is a plain list; binding is closure capture, no reflection
//! - Inject edits a copy of the tree; a failure discards the copy, so
//!   requests never see a partially injected cog
//! - Ejection removes a handler only while it is still ours, and prunes only
//!   the nodes our injection created
//! - One live cog per name is enforced by the registry, not here

pub mod registry;
pub mod status;

use std::any::Any;
use std::cmp::Reverse;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::{BoxFuture, FutureExt};

use crate::dispatch::Context;
use crate::http::Method;
use crate::routing::{parse_path, Handler, HandlerResult, RouteError, Router, Segment};

pub use registry::{CogError, CogRegistry};
pub use status::StatusCog;

type CogFn<C> = dyn Fn(Arc<C>, Context) -> BoxFuture<'static, HandlerResult> + Send + Sync;

/// One declared route of a cog, not yet bound to an instance.
pub struct RouteDecl<C> {
    path: String,
    method: Method,
    name: &'static str,
    func: Arc<CogFn<C>>,
}

impl<C: Send + Sync + 'static> RouteDecl<C> {
    /// `func` receives the owning instance and the request context.
    pub fn new<F, Fut>(path: impl Into<String>, method: Method, name: &'static str, func: F) -> Self
    where
        F: Fn(Arc<C>, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            path: path.into(),
            method,
            name,
            func: Arc::new(move |cog, ctx| func(cog, ctx).boxed()),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// A type whose instances contribute routes to a router.
pub trait Cog: Send + Sync + Sized + 'static {
    /// Unique name of the cog.
    const NAME: &'static str;

    /// Declared routes, in injection order.
    fn routes() -> Vec<RouteDecl<Self>>;
}

/// A declared route bound to its owning instance.
#[derive(Clone)]
pub struct RouteHolder {
    pub path: String,
    pub method: Method,
    pub handler: Handler,
    cog: Arc<dyn Any + Send + Sync>,
}

impl RouteHolder {
    /// The instance the handler belongs to, if it has type `C`.
    pub fn owner<C: Cog>(&self) -> Option<Arc<C>> {
        Arc::clone(&self.cog).downcast::<C>().ok()
    }
}

/// A cog instance with all of its routes bound.
#[derive(Clone)]
pub struct BoundCog {
    name: &'static str,
    routes: Vec<RouteHolder>,
    instance: Arc<dyn Any + Send + Sync>,
    /// Nodes the last successful injection created.
    created: Arc<Mutex<Vec<Vec<Segment>>>>,
}

impl BoundCog {
    pub fn new<C: Cog>(cog: C) -> Self {
        Self::from_arc(Arc::new(cog))
    }

    pub fn from_arc<C: Cog>(cog: Arc<C>) -> Self {
        let instance: Arc<dyn Any + Send + Sync> = cog.clone();
        let routes = C::routes()
            .into_iter()
            .map(|decl| {
                let owner = Arc::clone(&cog);
                let func = decl.func;
                let handler = Handler::new(format!("{}::{}", C::NAME, decl.name), move |ctx| {
                    func(Arc::clone(&owner), ctx)
                });
                RouteHolder {
                    path: decl.path,
                    method: decl.method,
                    handler,
                    cog: Arc::clone(&instance),
                }
            })
            .collect();

        Self {
            name: C::NAME,
            routes,
            instance,
            created: Arc::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn routes(&self) -> &[RouteHolder] {
        &self.routes
    }

    /// The bound instance, if it has type `C`.
    pub fn instance<C: Cog>(&self) -> Option<Arc<C>> {
        Arc::clone(&self.instance).downcast::<C>().ok()
    }

    /// Register every route in order, as one router transaction.
    ///
    /// On failure the router is left exactly as it was and the first error is
    /// returned.
    pub fn inject(&self, router: &Router) -> Result<(), RouteError> {
        let result = router.transaction(|root| {
            let mut created = Vec::new();
            for route in &self.routes {
                let segments = parse_path(&route.path)?;
                let depth = root.existing_depth(&segments);
                root.bind(&segments, route.method, route.handler.clone())?;
                created.extend((depth + 1..=segments.len()).map(|n| segments[..n].to_vec()));
            }
            Ok(created)
        });

        match result {
            Ok(created) => {
                *self.created.lock().unwrap_or_else(PoisonError::into_inner) = created;
                tracing::debug!(cog = self.name, routes = self.routes.len(), "Cog injected");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(cog = self.name, error = %e, "Cog injection failed, router unchanged");
                Err(e)
            }
        }
    }

    /// Remove every route still bound to this cog, then prune the nodes its
    /// injection created if nothing else uses them. Missing routes are skipped.
    pub fn eject(&self, router: &Router) {
        let mut created = std::mem::take(&mut *self.created.lock().unwrap_or_else(PoisonError::into_inner));
        // Deepest first, so a parent is checked after its children are gone.
        created.sort_by_key(|prefix| Reverse(prefix.len()));

        let result = router.transaction(|root| {
            let mut removed = 0usize;
            for route in &self.routes {
                let bound = parse_path(&route.path)
                    .map(|segments| root.unbind(&segments, route.method, &route.handler))
                    .unwrap_or(false);
                if bound {
                    removed += 1;
                } else {
                    tracing::debug!(cog = self.name, path = %route.path, method = %route.method, "Route already gone");
                }
            }
            for prefix in &created {
                root.prune(prefix);
            }
            Ok(removed)
        });

        match result {
            Ok(removed) => tracing::debug!(cog = self.name, routes = removed, "Cog ejected"),
            Err(e) => tracing::warn!(cog = self.name, error = %e, "Failed to eject cog"),
        }
    }
}

impl std::fmt::Debug for BoundCog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundCog")
            .field("name", &self.name)
            .field("routes", &self.routes.iter().map(|r| r.handler.name()).collect::<Vec<_>>())
            .finish()
    }
}
