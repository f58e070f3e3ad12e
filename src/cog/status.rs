//! Diagnostics cog exposing the router's own state.

use std::sync::{Arc, Weak};

use serde_json::json;

use crate::cog::{Cog, RouteDecl};
use crate::dispatch::Context;
use crate::http::Method;
use crate::routing::{HandlerResult, Router};

/// Serves `GET /_status/routes` and `GET /_status/services`.
///
/// Holds the router weakly: the router owns this cog's handlers.
pub struct StatusCog {
    router: Weak<Router>,
}

impl StatusCog {
    pub fn new(router: &Arc<Router>) -> Self {
        Self {
            router: Arc::downgrade(router),
        }
    }

    fn router(&self) -> Result<Arc<Router>, &'static str> {
        self.router.upgrade().ok_or("router is gone")
    }

    async fn route_table(self: Arc<Self>, _ctx: Context) -> HandlerResult {
        let router = self.router()?;
        Ok(Context::respond(json!({ "routes": router.route_table() })))
    }

    async fn service_list(self: Arc<Self>, ctx: Context) -> HandlerResult {
        let auth: Vec<&str> = ctx
            .services
            .names()
            .into_iter()
            .filter(|name| ctx.services.is_auth(name))
            .collect();
        Ok(Context::respond(json!({
            "services": ctx.services.names(),
            "auth": auth,
            "extensions": ctx.extensions.names(),
        })))
    }
}

impl Cog for StatusCog {
    const NAME: &'static str = "status";

    fn routes() -> Vec<RouteDecl<Self>> {
        vec![
            RouteDecl::new("/_status/routes", Method::Get, "routes", Self::route_table),
            RouteDecl::new("/_status/services", Method::Get, "services", Self::service_list),
        ]
    }
}
