//! Response construction and error-to-status mapping.
//!
//! # Responsibilities
//! - Serialize handler data as JSON responses
//! - Map dispatch failures to HTTP status codes with a JSON error body
//! - Advertise allowed methods on `405 Method Not Allowed`
//!
//! # Design Decisions
//! - Handler failures are logged in full but answered with a generic 500
//! - Client errors carry their message back to the caller

use axum::http::header::ALLOW;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::dispatch::error::join_methods;
use crate::dispatch::DispatchError;

/// `200 OK` with `data` as the JSON body.
pub fn json_response<T: Serialize>(data: T) -> Response {
    Json(data).into_response()
}

/// JSON error body for `status`.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = json!({
        "error": status.canonical_reason().unwrap_or("error"),
        "message": message.into(),
    });
    (status, Json(body)).into_response()
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            DispatchError::Handler(e) => {
                tracing::error!(error = %e, "Handler failed");
                return error_response(status, "internal server error");
            }
            DispatchError::MethodNotAllowed { allowed } => {
                let mut res = error_response(status, self.to_string());
                if let Ok(value) = HeaderValue::from_str(&join_methods(allowed)) {
                    res.headers_mut().insert(ALLOW, value);
                }
                return res;
            }
            _ => {}
        }
        tracing::debug!(status = status.as_u16(), error = %self, "Request failed");
        error_response(status, self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body(res: Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_method_not_allowed_sets_allow() {
        let res = DispatchError::MethodNotAllowed {
            allowed: vec![Method::Get, Method::Post],
        }
        .into_response();
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.headers()[ALLOW], "GET, POST");
        assert_eq!(body(res).await["error"], "Method Not Allowed");
    }

    #[tokio::test]
    async fn test_handler_error_is_hidden() {
        let res = DispatchError::Handler("db password is hunter2".into()).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(res).await["message"], "internal server error");
    }

    #[tokio::test]
    async fn test_client_errors() {
        let res = DispatchError::Unauthorized.into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body(res).await["message"], "unauthorized");

        let res = DispatchError::PayloadTooLarge { limit: 10 }.into_response();
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
