//! Per-request dispatch failures.

use axum::http::StatusCode;
use thiserror::Error;

use crate::http::method::UnsupportedMethod;
use crate::http::Method;
use crate::routing::HandlerError;

/// Why a request did not produce a handler response.
///
/// Everything except [`DispatchError::Handler`] is a client error and is
/// recoverable per request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// At least one auth service rejected the credential, or none was sent.
    #[error("unauthorized")]
    Unauthorized,

    /// No route matches the path, or the matched node has no handlers.
    #[error("not found")]
    NotFound,

    /// The path exists but not for this method.
    #[error("method not allowed (allowed: {})", join_methods(.allowed))]
    MethodNotAllowed { allowed: Vec<Method> },

    #[error(transparent)]
    UnsupportedMethod(#[from] UnsupportedMethod),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// The body could not be read, e.g. the client aborted mid-upload.
    #[error("failed to read request body: {0}")]
    BodyRead(#[source] axum::Error),

    /// Declared JSON body failed to parse.
    #[error("invalid JSON body: {0}")]
    InvalidBody(#[source] serde_json::Error),

    /// The handler itself failed.
    #[error("handler failed: {0}")]
    Handler(#[source] HandlerError),
}

impl DispatchError {
    /// HTTP status reported at the boundary.
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::Unauthorized => StatusCode::UNAUTHORIZED,
            DispatchError::NotFound => StatusCode::NOT_FOUND,
            DispatchError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            DispatchError::UnsupportedMethod(_) => StatusCode::NOT_IMPLEMENTED,
            DispatchError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            DispatchError::BodyRead(_) | DispatchError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            DispatchError::Handler(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Unauthorized => "unauthorized",
            DispatchError::NotFound => "not_found",
            DispatchError::MethodNotAllowed { .. } => "method_not_allowed",
            DispatchError::UnsupportedMethod(_) => "unsupported_method",
            DispatchError::PayloadTooLarge { .. } => "payload_too_large",
            DispatchError::BodyRead(_) => "body_read",
            DispatchError::InvalidBody(_) => "invalid_body",
            DispatchError::Handler(_) => "handler_error",
        }
    }
}

/// `GET, POST` style list, as used in `Allow` headers.
pub(crate) fn join_methods(methods: &[Method]) -> String {
    methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
