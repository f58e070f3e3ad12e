//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → handed to HttpServerBuilder and the observability setup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; routes change through cogs, not config
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    HeartbeatConfig, JwtConfig, LimitsConfig, ListenerConfig, ObservabilityConfig, SecurityConfig,
    ServerConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
