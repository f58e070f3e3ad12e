//! HTTP methods a handler can be registered for.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Methods that handlers can respond to.
///
/// Ordering follows declaration order, which is also the order methods are
/// reported in `Allow` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    /// All supported methods.
    pub const ALL: [Method; 7] = [
        Method::Get,
        Method::Head,
        Method::Post,
        Method::Put,
        Method::Patch,
        Method::Delete,
        Method::Options,
    ];

    /// Canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a method name is not one of [`Method::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported HTTP method: {0}")]
pub struct UnsupportedMethod(pub String);

impl FromStr for Method {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Method names are case-sensitive on the wire.
        Method::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnsupportedMethod(s.to_string()))
    }
}

impl TryFrom<&axum::http::Method> for Method {
    type Error = UnsupportedMethod;

    fn try_from(method: &axum::http::Method) -> Result<Self, Self::Error> {
        method.as_str().parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        for method in Method::ALL {
            assert_eq!(method.as_str().parse::<Method>().unwrap(), method);
            assert_eq!(method.to_string(), method.as_str());
        }
        assert!("get".parse::<Method>().is_err());
        assert_eq!(
            "TRACE".parse::<Method>().unwrap_err(),
            UnsupportedMethod("TRACE".into())
        );
    }

    #[test]
    fn test_from_axum_method() {
        assert_eq!(Method::try_from(&axum::http::Method::PATCH).unwrap(), Method::Patch);
        assert!(Method::try_from(&axum::http::Method::CONNECT).is_err());
    }
}
