//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Request (method, path, Authorization, body/query)
//!     → gate.rs (all auth services must accept; first one resolves the user)
//!     → body.rs (JSON body or query parameters → sent data)
//!     → context.rs (fresh Context with shared services/extensions)
//!     → routing::Route::dispatch (tree walk, URL variables, handler)
//!     → Response, or DispatchError mapped to a status at the boundary
//! ```

pub mod body;
pub mod context;
pub mod error;
pub mod gate;

pub use context::Context;
pub use error::DispatchError;
