//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0, addresses well formed)
//! - Check service settings (token URL scheme, JWT secret and algorithms)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::services::jwt::HMAC_ALGORITHMS;

/// One semantic problem in a config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check `config`, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !is_bind_address(&config.listener.bind_address) {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not a host:port address", config.listener.bind_address),
        ));
    }

    if let Some(token_url) = &config.security.token_url {
        match url::Url::parse(token_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ValidationError::new(
                "security.token_url",
                format!("unsupported scheme `{}`", url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new("security.token_url", e.to_string())),
        }
        if config.security.service_name.is_empty() {
            errors.push(ValidationError::new("security.service_name", "must not be empty"));
        }
    }

    if let Some(jwt) = &config.jwt {
        if jwt.secret.is_empty() {
            errors.push(ValidationError::new("jwt.secret", "must not be empty"));
        }
        for alg in &jwt.algorithms {
            if !HMAC_ALGORITHMS.contains(&alg.as_str()) {
                errors.push(ValidationError::new(
                    "jwt.algorithms",
                    format!("unsupported algorithm `{}`", alg),
                ));
            }
        }
        if config.security.token_url.is_some() && config.security.service_name == "jwt" {
            errors.push(ValidationError::new(
                "security.service_name",
                "`jwt` is taken by the JWT service",
            ));
        }
    }

    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::new("limits.max_body_bytes", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.heartbeat.enabled && config.heartbeat.interval_secs == 0 {
        errors.push(ValidationError::new("heartbeat.interval_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// A socket address, or `host:port` with a host name. Names are resolved
/// when the listener binds, not here.
fn is_bind_address(addr: &str) -> bool {
    if addr.parse::<SocketAddr>().is_ok() {
        return true;
    }
    match addr.rsplit_once(':') {
        Some((host, port)) => {
            port.parse::<u16>().is_ok()
                && !host.is_empty()
                && host
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        }
        None => false,
    }
}
