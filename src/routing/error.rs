//! Registration and lookup errors.

use thiserror::Error;

use crate::http::Method;
use crate::routing::handler::Handler;

/// Errors raised while building or querying the route tree.
///
/// All of these are registration-time failures and are never swallowed.
#[derive(Debug, Error)]
pub enum RouteError {
    /// A declared path does not follow the route syntax.
    #[error("invalid path `{path}`: {reason}")]
    InvalidPathSyntax { path: String, reason: String },

    /// A node already has a variable child with a different name.
    #[error("route already has variable child `{{{existing}}}`, refusing to add `{{{attempted}}}`")]
    ConflictingVariableRoute { existing: String, attempted: String },

    /// The method at this path is already bound.
    #[error(
        "method {method} at path {path} is already used by handler {existing}, \
         refusing to overwrite with handler {attempted}"
    )]
    HandlerAlreadyExists {
        path: String,
        method: Method,
        existing: Handler,
        attempted: Handler,
    },

    /// Lookup ran out of matching nodes; carries the unresolved remainder.
    #[error("route at path {remaining:?} does not exist")]
    RouteNotFound { remaining: Vec<String> },
}

impl RouteError {
    /// Replace the node-local path of a `HandlerAlreadyExists` with the full path.
    pub(crate) fn at_path(self, full_path: &str) -> Self {
        match self {
            RouteError::HandlerAlreadyExists {
                method,
                existing,
                attempted,
                ..
            } => RouteError::HandlerAlreadyExists {
                path: full_path.to_string(),
                method,
                existing,
                attempted,
            },
            other => other,
        }
    }
}
