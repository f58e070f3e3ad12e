//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration:
//!     "/users/{id}" → path.rs (validate, split into segments)
//!     → router.rs (copy tree, edit, publish)
//!     → node.rs (create chain, bind handler per method)
//!
//! Dispatch:
//!     Request path → split on "/" → router.rs (auth gate, sent data, Context)
//!     → node.rs (static child, else variable child binding a URL variable)
//!     → Handler, MethodNotAllowed or NotFound
//! ```
//!
//! # Design Decisions
//! - Routes change at runtime (cogs load and unload while serving)
//! - Exact literal beats variable at the same depth
//! - Deterministic: same tree and path always resolve the same way

pub mod error;
pub mod handler;
pub mod node;
pub mod path;
pub mod router;

pub use error::RouteError;
pub use handler::{Handler, HandlerError, HandlerResult};
pub use node::{Route, RouteInfo};
pub use path::{parse_path, Segment};
pub use router::Router;
