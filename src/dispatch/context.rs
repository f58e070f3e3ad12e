//! Per-request execution context handed to handlers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::response::Response;
use serde::Serialize;
use serde_json::Value;

use crate::extensions::{Extension, ExtensionMap};
use crate::http::response::json_response;
use crate::http::Request;
use crate::services::{Service, ServiceMap};

/// Everything a handler gets for one request.
///
/// Created fresh by every dispatch and dropped when the handler returns. The
/// service and extension maps are shared with every other request.
pub struct Context {
    /// The buffered inbound request.
    pub request: Request,
    /// URL variables bound while walking the route tree.
    pub url_data: HashMap<String, String>,
    pub services: Arc<ServiceMap>,
    pub extensions: Arc<ExtensionMap>,
    /// Parsed JSON body, or the query parameters as a JSON object.
    pub sent_data: Value,
    /// Identity resolved by the first auth service, if any.
    pub user_data: Option<Value>,
}

impl Context {
    pub fn new(
        request: Request,
        services: Arc<ServiceMap>,
        extensions: Arc<ExtensionMap>,
        sent_data: Value,
        user_data: Option<Value>,
    ) -> Self {
        Self {
            request,
            url_data: HashMap::new(),
            services,
            extensions,
            sent_data,
            user_data,
        }
    }

    /// A URL variable bound by a `{name}` segment.
    pub fn url_var(&self, name: &str) -> Option<&str> {
        self.url_data.get(name).map(String::as_str)
    }

    /// A top-level field of the sent data.
    pub fn sent(&self, key: &str) -> Option<&Value> {
        self.sent_data.get(key)
    }

    /// A registered service by name and concrete type.
    pub fn service<S: Service>(&self, name: &str) -> Option<Arc<S>> {
        self.services.get(name)
    }

    /// A registered extension by name and concrete type.
    pub fn extension<E: Extension>(&self, name: &str) -> Option<Arc<E>> {
        self.extensions.get(name)
    }

    /// Serialize `data` as a `200 OK` JSON response.
    pub fn respond<T: Serialize>(data: T) -> Response {
        json_response(data)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("method", &self.request.method())
            .field("path", &self.request.path())
            .field("url_data", &self.url_data)
            .field("sent_data", &self.sent_data)
            .field("user_data", &self.user_data)
            .finish_non_exhaustive()
    }
}
