//! Authorization capability for services.

use async_trait::async_trait;
use serde_json::Value;

/// A service that can vouch for a request credential.
///
/// `credential` is the raw `Authorization` header value.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Whether the credential may use the router.
    async fn authorize(&self, credential: &str) -> bool;

    /// Identity behind the credential, attached to the request context.
    async fn resolve_user(&self, credential: &str) -> Option<Value>;
}
