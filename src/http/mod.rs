//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware: request ID, trace, timeout, limits)
//!     → request.rs (buffer body, map method, expose credential)
//!     → routing::Router::dispatch
//!     → response.rs (JSON bodies, error → status mapping)
//!     → Send to client
//! ```

pub mod method;
pub mod request;
pub mod response;
pub mod server;

pub use method::Method;
pub use request::{Request, X_REQUEST_ID};
pub use server::{HttpServer, HttpServerBuilder, ServerError};
