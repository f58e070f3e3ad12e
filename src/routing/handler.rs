//! Handler functions stored in the route tree.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::response::Response;
use futures_util::future::{BoxFuture, FutureExt};

use crate::dispatch::Context;

/// Error returned by a handler. Not caught by dispatch; the HTTP boundary
/// turns it into a 500.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result of running a handler.
pub type HandlerResult = Result<Response, HandlerError>;

type HandlerFn = dyn Fn(Context) -> BoxFuture<'static, HandlerResult> + Send + Sync;

/// A named async request handler.
///
/// Cloning is cheap; clones share the same function and compare equal.
#[derive(Clone)]
pub struct Handler {
    name: Arc<str>,
    func: Arc<HandlerFn>,
}

impl Handler {
    /// Wrap an async function.
    pub fn new<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            func: Arc::new(move |ctx| func(ctx).boxed()),
        }
    }

    /// Name used in diagnostics and errors.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the handler.
    pub fn call(&self, ctx: Context) -> BoxFuture<'static, HandlerResult> {
        (self.func)(ctx)
    }

    /// Whether both refer to the same function.
    pub fn same_as(&self, other: &Handler) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.name).finish()
    }
}

impl fmt::Display for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}
