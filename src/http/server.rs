//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Assemble extensions, services and the router from config and user code
//! - Wire up middleware (tracing, request ID, timeout, body limit, panics)
//! - Dispatch every request to the router through a single fallback handler
//! - Load and unload cogs while serving
//! - Start extensions, serve until exit, then drain and join them

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::cog::{BoundCog, Cog, CogError, CogRegistry};
use crate::config::{validate_config, ConfigError, ServerConfig};
use crate::extensions::{Extension, ExtensionMap};
use crate::http::request::{Request, X_REQUEST_ID};
use crate::http::response::error_response;
use crate::lifecycle::shutdown::{join_extensions, stop_extensions, Shutdown};
use crate::lifecycle::startup::start_extensions;
use crate::routing::Router;
use crate::services::{BoxError, JwtService, Service, ServiceError, ServiceMap, ServiceRegistry, TokenValidator};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Cog(#[from] CogError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into the dispatch handler.
#[derive(Clone)]
struct AppState {
    router: Arc<Router>,
    max_body_bytes: usize,
}

/// Collects extensions and service factories before the server exists.
pub struct HttpServerBuilder {
    config: ServerConfig,
    extensions: ExtensionMap,
    services: ServiceRegistry,
    errors: Vec<ServiceError>,
}

impl HttpServerBuilder {
    /// Add an extension; it is started with the server.
    pub fn extension<E: Extension>(mut self, name: impl Into<String>, extension: E) -> Self {
        if let Err(e) = self.extensions.insert(name, extension) {
            self.errors.push(e);
        }
        self
    }

    /// Add a service factory. Factories run in declaration order and see the
    /// extensions plus every service declared before them.
    pub fn service<S, F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        S: Service,
        F: FnOnce(&ExtensionMap, &ServiceMap) -> Result<S, BoxError> + Send + 'static,
    {
        self.services.register(name, factory);
        self
    }

    /// Validate the config and construct every service.
    pub fn build(mut self) -> Result<HttpServer, ServerError> {
        validate_config(&self.config).map_err(ConfigError::Validation)?;
        if let Some(e) = self.errors.into_iter().next() {
            return Err(e.into());
        }

        if let Some(url) = self.config.security.token_url.clone() {
            self.services.register(self.config.security.service_name.clone(), move |_, _| {
                TokenValidator::new(url).map_err(BoxError::from)
            });
        }
        if let Some(jwt) = self.config.jwt.clone() {
            self.services.register("jwt", move |_, _| {
                JwtService::new(&jwt.secret, &jwt.algorithms)
                    .map(|service| service.authorizing(jwt.authorize))
                    .map_err(BoxError::from)
            });
        }

        let services = self.services.build(&self.extensions)?;
        tracing::info!(
            services = ?services.names(),
            extensions = ?self.extensions.names(),
            "Services constructed"
        );

        let router = Router::new(Arc::new(services), Arc::new(self.extensions));
        Ok(HttpServer {
            config: self.config,
            router: Arc::new(router),
            cogs: CogRegistry::new(),
            shutdown: Shutdown::new(),
        })
    }
}

/// HTTP server wrapping a [`Router`].
pub struct HttpServer {
    config: ServerConfig,
    router: Arc<Router>,
    cogs: CogRegistry,
    shutdown: Shutdown,
}

impl HttpServer {
    pub fn builder(config: ServerConfig) -> HttpServerBuilder {
        HttpServerBuilder {
            config,
            extensions: ExtensionMap::new(),
            services: ServiceRegistry::new(),
            errors: Vec::new(),
        }
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Inject `cog` and keep it live under its name.
    pub fn load_cog<C: Cog>(&self, cog: C) -> Result<(), CogError> {
        self.load_bound(BoundCog::new(cog))
    }

    /// Variant of [`HttpServer::load_cog`] for an already bound cog.
    pub fn load_bound(&self, cog: BoundCog) -> Result<(), CogError> {
        self.cogs.load(cog, &self.router)
    }

    /// Eject the cog called `name`. Returns whether it was loaded.
    pub fn unload_cog(&self, name: &str) -> bool {
        self.cogs.unload(name, &self.router)
    }

    pub fn cog_names(&self) -> Vec<String> {
        self.cogs.names()
    }

    /// Clone of the exit signal. Triggering it stops the server like
    /// [`HttpServer::exit`], with extensions stopped once connections drain.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn app(&self) -> axum::Router {
        let state = AppState {
            router: Arc::clone(&self.router),
            max_body_bytes: self.config.limits.max_body_bytes,
        };

        axum::Router::new()
            .fallback(dispatch_handler)
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(self.config.limits.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(self.config.timeouts.request_secs)))
            .layer(axum::middleware::map_response(json_error_body))
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<Body>| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    request_id = %request_id,
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Extensions start first; the call returns after [`HttpServer::exit`],
    /// once connections drained and extensions finished or the grace period
    /// ran out.
    pub async fn run(&self, listener: TcpListener) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        let running = start_extensions(self.router.services(), self.router.extensions());

        tracing::info!(
            address = %addr,
            extensions = running.len(),
            cogs = ?self.cogs.names(),
            "Server ready"
        );

        let shutdown = self.shutdown.clone();
        let served = axum::serve(listener, self.app())
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await;
        tracing::info!("HTTP server stopped");

        // `stop` is idempotent; exit() may already have called it.
        stop_extensions(self.router.extensions()).await;
        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        join_extensions(running, grace).await;

        served?;
        Ok(())
    }

    /// Signal every extension to stop, then stop the server.
    pub async fn exit(&self) {
        tracing::info!("Server exiting");
        stop_extensions(self.router.extensions()).await;
        self.shutdown.trigger();
    }
}

/// Single entry point for every method and path.
async fn dispatch_handler(State(state): State<AppState>, request: axum::extract::Request) -> Response {
    let request = match Request::from_http(request, state.max_body_bytes).await {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };
    match state.router.dispatch(request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

/// Replace the plain bodies of 408 and 413 answers produced by middleware.
async fn json_error_body(response: Response) -> Response {
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if is_json {
        return response;
    }
    match response.status() {
        StatusCode::REQUEST_TIMEOUT => error_response(StatusCode::REQUEST_TIMEOUT, "request timed out"),
        StatusCode::PAYLOAD_TOO_LARGE => error_response(StatusCode::PAYLOAD_TOO_LARGE, "request body too large"),
        _ => response,
    }
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %message, "Handler panicked");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
}
