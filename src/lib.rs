//! restcore: a REST routing core with hot-loadable route groups.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ http::server (axum, middleware)
//!                        │
//!                        ▼
//!                    routing::Router ──▶ dispatch::gate (auth services)
//!                        │          ──▶ dispatch::body (sent data)
//!                        ▼
//!                    routing::Route tree ──▶ Handler(Context)
//!                        ▲
//!     cog::CogRegistry ──┘ (load / unload while serving)
//!
//!     services: shared capability objects      extensions: background tasks
//!     lifecycle: start, exit, drain            observability: logs, metrics
//! ```

pub mod cog;
pub mod config;
pub mod dispatch;
pub mod extensions;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod services;

pub use cog::{BoundCog, Cog, RouteDecl};
pub use config::ServerConfig;
pub use dispatch::{Context, DispatchError};
pub use http::{HttpServer, Method, Request};
pub use lifecycle::Shutdown;
pub use routing::{Handler, HandlerError, HandlerResult, RouteError, Router};
