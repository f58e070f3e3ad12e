//! Inbound request representation.
//!
//! # Responsibilities
//! - Capture what dispatch needs from the wire request (method, path, query,
//!   headers, buffered body)
//! - Expose the credential token and content type to the auth gate
//! - Carry the request ID assigned by the HTTP layer
//!
//! # Design Decisions
//! - Body is buffered before dispatch; the limit is enforced by the caller
//! - Headers keep the `http` crate's case-insensitive map

use axum::body::{Body, Bytes};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use http_body_util::LengthLimitError;

use crate::dispatch::DispatchError;
use crate::http::method::Method;

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// A fully buffered inbound request.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
}

impl Request {
    /// Create a request with no headers, query or body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Add a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Set the raw query string (without the leading `?`).
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a JSON body and the matching content type.
    pub fn with_json(self, value: &serde_json::Value) -> Self {
        self.with_header("content-type", "application/json")
            .with_body(value.to_string())
    }

    /// Buffer an `axum` request, enforcing `max_body_bytes`.
    pub async fn from_http(
        request: axum::http::Request<Body>,
        max_body_bytes: usize,
    ) -> Result<Self, DispatchError> {
        let (parts, body) = request.into_parts();
        let method = Method::try_from(&parts.method)?;
        let body = axum::body::to_bytes(body, max_body_bytes).await.map_err(|e| {
            if exceeds_limit(&e) {
                DispatchError::PayloadTooLarge { limit: max_body_bytes }
            } else {
                DispatchError::BodyRead(e)
            }
        })?;

        Ok(Self {
            method,
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers,
            body,
        })
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Absolute request path, still percent-encoded.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Value of a header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The credential token handed to auth services.
    pub fn authorization(&self) -> Option<&str> {
        self.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
    }

    /// The media type, without parameters such as `charset`.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim())
    }

    /// Whether the body is declared as JSON.
    pub fn is_json(&self) -> bool {
        self.content_type()
            .map(|ct| ct.eq_ignore_ascii_case("application/json"))
            .unwrap_or(false)
    }

    /// ID assigned by the request-id layer, if any.
    pub fn request_id(&self) -> Option<&str> {
        self.header(X_REQUEST_ID)
    }
}

fn exceeds_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_parameters_are_ignored() {
        let req = Request::new(Method::Post, "/a")
            .with_header("Content-Type", "application/json; charset=utf-8");
        assert_eq!(req.content_type(), Some("application/json"));
        assert!(req.is_json());

        let form = Request::new(Method::Post, "/a")
            .with_header("Content-Type", "application/x-www-form-urlencoded");
        assert!(!form.is_json());
        assert!(!Request::new(Method::Get, "/a").is_json());
    }

    #[test]
    fn test_authorization_header() {
        let req = Request::new(Method::Get, "/").with_header("authorization", "Bearer abc");
        assert_eq!(req.authorization(), Some("Bearer abc"));
        assert_eq!(Request::new(Method::Get, "/").authorization(), None);
    }

    #[test]
    fn test_request_id_header() {
        let req = Request::new(Method::Get, "/").with_header(X_REQUEST_ID, "req-1");
        assert_eq!(req.request_id(), Some("req-1"));
        assert_eq!(Request::new(Method::Get, "/").request_id(), None);
    }

    #[tokio::test]
    async fn test_from_http_buffers_body_and_query() {
        let http = axum::http::Request::builder()
            .method("POST")
            .uri("/items/1?verbose=true")
            .body(Body::from("hello"))
            .unwrap();
        let req = Request::from_http(http, 1024).await.unwrap();
        assert_eq!(req.method(), Method::Post);
        assert_eq!(req.path(), "/items/1");
        assert_eq!(req.query(), Some("verbose=true"));
        assert_eq!(req.body().as_ref(), b"hello");
    }

    #[tokio::test]
    async fn test_from_http_rejects_large_body() {
        let http = axum::http::Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(vec![0u8; 64]))
            .unwrap();
        let err = Request::from_http(http, 16).await.unwrap_err();
        assert!(matches!(err, DispatchError::PayloadTooLarge { limit: 16 }));
    }

    #[tokio::test]
    async fn test_aborted_body_is_not_too_large() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"ab")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "client went away")),
        ];
        let http = axum::http::Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from_stream(futures_util::stream::iter(chunks)))
            .unwrap();
        let err = Request::from_http(http, 1024).await.unwrap_err();
        assert!(matches!(err, DispatchError::BodyRead(_)));
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_from_http_rejects_unknown_method() {
        let http = axum::http::Request::builder()
            .method("TRACE")
            .uri("/")
            .body(Body::empty())
            .unwrap();
        let err = Request::from_http(http, 16).await.unwrap_err();
        assert!(matches!(err, DispatchError::UnsupportedMethod(_)));
    }
}
