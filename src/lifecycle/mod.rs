//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Services built → extensions spawned → "ready" logged → accept traffic
//!
//! Shutdown (shutdown.rs):
//!     exit() → every Extension::stop() concurrently → Shutdown triggered
//!     → listener drains → extension tasks joined within the grace period
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → exit()
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop extensions, stop accepting, drain, join
//! - Extensions are never cancelled; stragglers are only logged

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{RunningExtension, Shutdown};
