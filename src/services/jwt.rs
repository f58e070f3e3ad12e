//! Local JWT verification with a shared secret.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::Value;
use thiserror::Error;

use crate::services::{AuthService, Service};

/// Algorithms usable with a shared secret.
pub const HMAC_ALGORITHMS: [&str; 3] = ["HS256", "HS384", "HS512"];

/// A token failed to decode or verify.
#[derive(Debug, Error)]
#[error("the token {token} is not valid: {source}")]
pub struct TokenInvalid {
    pub token: String,
    #[source]
    pub source: jsonwebtoken::errors::Error,
}

/// Decodes and verifies HMAC-signed JWTs.
///
/// Only claims the token carries are validated; `exp` and friends are not
/// required.
pub struct JwtService {
    key: DecodingKey,
    validation: Validation,
    authorize: bool,
}

impl JwtService {
    /// `algorithms` are names such as `HS256`; an empty list means `HS256`.
    pub fn new(secret: &str, algorithms: &[String]) -> Result<Self, jsonwebtoken::errors::Error> {
        let mut parsed = algorithms
            .iter()
            .map(|a| Algorithm::from_str(a))
            .collect::<Result<Vec<_>, _>>()?;
        if parsed.is_empty() {
            parsed.push(Algorithm::HS256);
        }

        let mut validation = Validation::new(parsed[0]);
        validation.algorithms = parsed;
        validation.required_spec_claims = HashSet::new();

        Ok(Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            authorize: false,
        })
    }

    /// Also take part in the authorization gate.
    pub fn authorizing(mut self, authorize: bool) -> Self {
        self.authorize = authorize;
        self
    }

    /// Claims of a valid token. A leading `Bearer ` is ignored.
    pub fn decode(&self, token: &str) -> Result<Value, TokenInvalid> {
        let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();
        jsonwebtoken::decode::<Value>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|source| TokenInvalid {
                token: token.to_string(),
                source,
            })
    }
}

impl Service for JwtService {
    fn auth(self: Arc<Self>) -> Option<Arc<dyn AuthService>> {
        if self.authorize {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl AuthService for JwtService {
    async fn authorize(&self, credential: &str) -> bool {
        match self.decode(credential) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e.source, "JWT rejected");
                false
            }
        }
    }

    async fn resolve_user(&self, credential: &str) -> Option<Value> {
        self.decode(credential).ok()
    }
}
