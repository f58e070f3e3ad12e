//! Token introspection against a remote identity backend.
//!
//! # Wire Contract
//! ```text
//! GET {base}/verify    Authorization: <credential>   200 → accepted
//! GET {base}/get_user  Authorization: <credential>   200 → JSON user data
//! ```
//! Any other status or a transport failure counts as a rejection (or no user).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::services::{AuthService, Service};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Auth service that asks an HTTP backend about each credential.
pub struct TokenValidator {
    client: Client,
    base_url: String,
}

impl TokenValidator {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, endpoint: &str, credential: &str) -> Result<reqwest::Response, reqwest::Error> {
        self.client
            .get(format!("{}/{}", self.base_url, endpoint))
            .header(AUTHORIZATION, credential)
            .send()
            .await
    }
}

impl Service for TokenValidator {
    fn auth(self: Arc<Self>) -> Option<Arc<dyn AuthService>> {
        Some(self)
    }
}

#[async_trait]
impl AuthService for TokenValidator {
    async fn authorize(&self, credential: &str) -> bool {
        match self.get("verify", credential).await {
            Ok(res) => res.status() == StatusCode::OK,
            Err(e) => {
                tracing::warn!(backend = %self.base_url, error = %e, "Token verification request failed");
                false
            }
        }
    }

    async fn resolve_user(&self, credential: &str) -> Option<Value> {
        let res = match self.get("get_user", credential).await {
            Ok(res) if res.status() == StatusCode::OK => res,
            Ok(res) => {
                tracing::debug!(status = %res.status(), "Token backend returned no user");
                return None;
            }
            Err(e) => {
                tracing::warn!(backend = %self.base_url, error = %e, "User lookup request failed");
                return None;
            }
        };
        match res.json::<Value>().await {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(error = %e, "User lookup returned invalid JSON");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::routing::get;
    use axum::Json;
    use serde_json::json;

    async fn spawn_backend() -> String {
        async fn verify(headers: HeaderMap) -> StatusCode {
            match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                Some("good") => StatusCode::OK,
                _ => StatusCode::UNAUTHORIZED,
            }
        }

        async fn get_user(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
            match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                Some("good") => Ok(Json(json!({ "id": 1, "name": "alice" }))),
                _ => Err(StatusCode::NOT_FOUND),
            }
        }

        let app = axum::Router::new()
            .route("/verify", get(verify))
            .route("/get_user", get(get_user));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[test]
    fn test_trailing_slash_is_ignored() {
        let validator = TokenValidator::new("http://auth.local/api/").unwrap();
        assert_eq!(validator.base_url(), "http://auth.local/api");
    }

    #[tokio::test]
    async fn test_verify_and_user_lookup() {
        let validator = TokenValidator::new(spawn_backend().await).unwrap();

        assert!(validator.authorize("good").await);
        assert!(!validator.authorize("bad").await);

        let user = validator.resolve_user("good").await.unwrap();
        assert_eq!(user["name"], "alice");
        assert!(validator.resolve_user("bad").await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_backend_rejects() {
        // Bind then drop to get a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let validator = TokenValidator::new(format!("http://{}", addr)).unwrap();
        assert!(!validator.authorize("good").await);
        assert!(validator.resolve_user("good").await.is_none());
    }
}
