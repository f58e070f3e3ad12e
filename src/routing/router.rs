//! Router: the route tree plus the authorization-gated dispatch entry point.
//!
//! # Responsibilities
//! - Parse declared paths and delegate to the route tree
//! - Publish tree changes atomically while requests are being served
//! - Run the auth gate, extract sent data and build the per-request context
//!
//! # Design Decisions
//! - Dispatch loads a snapshot of the tree without locking
//! - Writers are serialized; each mutation edits a private copy of the tree
//!   and publishes it only if the whole operation succeeded
//! - The auth-capable services are collected once, at construction

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use arc_swap::ArcSwap;
use axum::response::Response;

use crate::dispatch::{body, gate, Context, DispatchError};
use crate::extensions::ExtensionMap;
use crate::http::{Method, Request};
use crate::observability::metrics;
use crate::routing::error::RouteError;
use crate::routing::handler::Handler;
use crate::routing::node::{Route, RouteInfo};
use crate::routing::path::{join_segments, parse_path, split_request_path};
use crate::services::{AuthService, ServiceMap};

pub struct Router {
    tree: ArcSwap<Route>,
    writer: Mutex<()>,
    services: Arc<ServiceMap>,
    extensions: Arc<ExtensionMap>,
    auth: Vec<Arc<dyn AuthService>>,
}

impl Router {
    pub fn new(services: Arc<ServiceMap>, extensions: Arc<ExtensionMap>) -> Self {
        let auth = services.auth_services();
        Self {
            tree: ArcSwap::from_pointee(Route::root()),
            writer: Mutex::new(()),
            services,
            extensions,
            auth,
        }
    }

    pub fn services(&self) -> &Arc<ServiceMap> {
        &self.services
    }

    pub fn extensions(&self) -> &Arc<ExtensionMap> {
        &self.extensions
    }

    /// Current tree. Later mutations do not affect the returned snapshot.
    pub fn snapshot(&self) -> Arc<Route> {
        self.tree.load_full()
    }

    /// Apply `op` to a private copy of the tree and publish the copy only if
    /// `op` succeeds. Readers see either none or all of its edits.
    pub fn transaction<T>(&self, op: impl FnOnce(&mut Route) -> Result<T, RouteError>) -> Result<T, RouteError> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut tree = Route::clone(&self.tree.load());
        let out = op(&mut tree)?;
        self.tree.store(Arc::new(tree));
        Ok(out)
    }

    /// Ensure the chain of nodes for `path` exists.
    pub fn add_route(&self, path: &str) -> Result<(), RouteError> {
        let segments = parse_path(path)?;
        self.transaction(|root| root.add_route(&segments).map(|_| ()))
    }

    /// Remove the node at `path` with everything below it.
    pub fn remove_route(&self, path: &str) -> Result<bool, RouteError> {
        let segments = parse_path(path)?;
        let removed = self.transaction(|root| Ok(root.remove_route(&segments)))?;
        if removed {
            tracing::debug!(path = %path, "Route removed");
        }
        Ok(removed)
    }

    /// Bind `handler` to `method` at `path`, creating the path if needed.
    pub fn add_handler(&self, path: &str, method: Method, handler: Handler) -> Result<(), RouteError> {
        let segments = parse_path(path)?;
        let full_path = join_segments(&segments);
        let name = handler.name().to_string();

        self.transaction(|root| root.bind(&segments, method, handler))?;

        tracing::debug!(path = %full_path, method = %method, handler = %name, "Handler added");
        Ok(())
    }

    /// Unbind the handler for `method` at `path`; empty nodes are pruned.
    pub fn remove_handler(&self, path: &str, method: Method) -> Result<bool, RouteError> {
        let segments = parse_path(path)?;
        self.transaction(|root| Ok(root.remove_handler(&segments, method)))
    }

    /// Unbind `method` at `path` only if it is still bound to `handler`.
    pub fn remove_bound_handler(&self, path: &str, method: Method, handler: &Handler) -> Result<bool, RouteError> {
        let segments = parse_path(path)?;
        self.transaction(|root| {
            let owned = root
                .get_route(&segments)
                .ok()
                .and_then(|node| node.handler(method))
                .is_some_and(|bound| bound.same_as(handler));
            Ok(owned && root.remove_handler(&segments, method))
        })
    }

    /// The node declared by `path`.
    pub fn get_route(&self, path: &str) -> Result<RouteInfo, RouteError> {
        let segments = parse_path(path)?;
        let tree = self.tree.load();
        let node = tree.get_route(&segments)?;
        Ok(RouteInfo {
            path: join_segments(&segments),
            methods: node.allowed_methods(),
        })
    }

    /// The handler bound to `method` at `path`.
    pub fn handler(&self, path: &str, method: Method) -> Option<Handler> {
        let segments = parse_path(path).ok()?;
        let tree = self.tree.load();
        tree.get_route(&segments).ok()?.handler(method).cloned()
    }

    /// Every registered path prefix, pre-order, static before variable.
    pub fn list_routes(&self) -> Vec<String> {
        self.route_table()
            .into_iter()
            .filter(|info| info.path != "/")
            .map(|info| info.path)
            .collect()
    }

    /// Listed paths with their bound methods; `/` leads when it has handlers.
    pub fn route_table(&self) -> Vec<RouteInfo> {
        let tree = self.tree.load();
        let mut out = Vec::new();
        if !tree.allowed_methods().is_empty() {
            out.push(RouteInfo {
                path: "/".to_string(),
                methods: tree.allowed_methods(),
            });
        }
        tree.collect("", &mut out);
        out
    }

    /// Authorize, extract and route one request.
    pub async fn dispatch(&self, request: Request) -> Result<Response, DispatchError> {
        let start_time = Instant::now();
        let method = request.method();

        let result = self.dispatch_inner(request).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        metrics::record_request(method.as_str(), outcome, start_time);
        result
    }

    async fn dispatch_inner(&self, request: Request) -> Result<Response, DispatchError> {
        let credential = request.authorization().map(str::to_owned);

        if !gate::authorize(&self.auth, credential.as_deref()).await {
            metrics::record_auth_rejection();
            tracing::debug!(
                path = %request.path(),
                request_id = request.request_id().unwrap_or("-"),
                "Request rejected by auth gate"
            );
            return Err(DispatchError::Unauthorized);
        }
        let user_data = gate::resolve_user(&self.auth, credential.as_deref()).await;
        let sent_data = body::sent_data(&request)?;

        let method = request.method();
        let path = request.path().to_string();
        let segments = split_request_path(&path);
        let tree = self.tree.load_full();

        let ctx = Context::new(
            request,
            Arc::clone(&self.services),
            Arc::clone(&self.extensions),
            sent_data,
            user_data,
        );
        tree.dispatch(&segments, method, ctx).await
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(Arc::new(ServiceMap::new()), Arc::new(ExtensionMap::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Context;
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    fn echo(name: &str) -> Handler {
        Handler::new(name, |ctx: Context| async move {
            Ok(Context::respond(json!({
                "url": ctx.url_data,
                "sent": ctx.sent_data,
            })))
        })
    }

    async fn body_json(res: Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_add_handler_reports_full_path() {
        let router = Router::default();
        router.add_handler("/a/{id}", Method::Get, echo("first")).unwrap();
        let err = router
            .add_handler("/a/{id}/", Method::Get, echo("second"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "method GET at path /a/{id} is already used by handler first, \
             refusing to overwrite with handler second"
        );
        assert_eq!(router.handler("/a/{id}", Method::Get).unwrap().name(), "first");
    }

    #[test]
    fn test_failed_update_is_not_published() {
        let router = Router::default();
        router.add_route("/a/{id}").unwrap();
        let before = router.list_routes();

        assert!(matches!(
            router.add_handler("/a/{other}/deep", Method::Get, echo("x")),
            Err(RouteError::ConflictingVariableRoute { .. })
        ));
        assert_eq!(router.list_routes(), before);
    }

    #[test]
    fn test_transaction_publishes_all_or_nothing() {
        let router = Router::default();
        let segments = parse_path("/one").unwrap();
        let err = router
            .transaction(|root| {
                root.bind(&segments, Method::Get, echo("one"))?;
                root.bind(&segments, Method::Get, echo("again"))
            })
            .unwrap_err();
        assert!(matches!(err, RouteError::HandlerAlreadyExists { .. }));
        assert!(router.list_routes().is_empty());
    }

    #[test]
    fn test_remove_bound_handler_checks_identity() {
        let router = Router::default();
        let mine = echo("mine");
        router.add_handler("/x/y", Method::Get, mine.clone()).unwrap();

        assert!(!router.remove_bound_handler("/x/y", Method::Get, &echo("mine")).unwrap());
        assert_eq!(router.list_routes(), vec!["/x", "/x/y"]);
        assert!(router.remove_bound_handler("/x/y", Method::Get, &mine).unwrap());
        assert!(router.list_routes().is_empty());
    }

    #[test]
    fn test_snapshot_is_stable() {
        let router = Router::default();
        router.add_handler("/a", Method::Get, echo("a")).unwrap();
        let snapshot = router.snapshot();
        router.remove_route("/a").unwrap();

        assert_eq!(snapshot.children().len(), 1);
        assert!(router.list_routes().is_empty());
    }

    #[test]
    fn test_route_table_and_get_route() {
        let router = Router::default();
        router.add_handler("/", Method::Get, echo("root")).unwrap();
        router.add_handler("/users/{id}", Method::Get, echo("get")).unwrap();
        router.add_handler("/users/{id}", Method::Delete, echo("del")).unwrap();

        let table = router.route_table();
        assert_eq!(table[0].path, "/");
        assert_eq!(table[2].path, "/users/{id}");
        assert_eq!(table[2].methods, vec![Method::Get, Method::Delete]);
        assert_eq!(router.list_routes(), vec!["/users", "/users/{id}"]);

        assert_eq!(router.get_route("/users").unwrap().methods, vec![]);
        assert!(matches!(
            router.get_route("/users/{other}"),
            Err(RouteError::RouteNotFound { .. })
        ));
        assert!(matches!(
            router.get_route("users"),
            Err(RouteError::InvalidPathSyntax { .. })
        ));
    }

    #[tokio::test]
    async fn test_dispatch_binds_variables_and_query() {
        let router = Router::default();
        router.add_handler("/items/{id}", Method::Get, echo("item")).unwrap();

        let req = Request::new(Method::Get, "/items/a%20b").with_query("x=1");
        let res = router.dispatch(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            body_json(res).await,
            json!({ "url": { "id": "a b" }, "sent": { "x": "1" } })
        );
    }

    #[tokio::test]
    async fn test_dispatch_errors() {
        let router = Router::default();
        router.add_handler("/items", Method::Post, echo("create")).unwrap();

        let not_allowed = router.dispatch(Request::new(Method::Get, "/items")).await;
        assert!(matches!(
            not_allowed,
            Err(DispatchError::MethodNotAllowed { ref allowed }) if allowed == &vec![Method::Post]
        ));
        assert!(matches!(
            router.dispatch(Request::new(Method::Get, "/nothing")).await,
            Err(DispatchError::NotFound)
        ));

        let bad_json = Request::new(Method::Post, "/items")
            .with_header("content-type", "application/json")
            .with_body("{");
        assert!(matches!(
            router.dispatch(bad_json).await,
            Err(DispatchError::InvalidBody(_))
        ));
    }

    #[tokio::test]
    async fn test_handler_error_is_propagated() {
        let router = Router::default();
        router
            .add_handler(
                "/boom",
                Method::Get,
                Handler::new("boom", |_ctx: Context| async move { Err("kaboom".into()) }),
            )
            .unwrap();

        match router.dispatch(Request::new(Method::Get, "/boom")).await {
            Err(DispatchError::Handler(e)) => assert_eq!(e.to_string(), "kaboom"),
            other => panic!("unexpected result: {:?}", other.map(|r| r.status())),
        }
    }
}
