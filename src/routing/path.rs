//! Route declaration syntax.
//!
//! Declared paths are absolute, `/`-separated and case-sensitive. A segment of
//! the form `{name}` binds any single request segment to `name`. Segment
//! characters are restricted to ASCII alphanumerics, `.`, `-` and `_`.

use std::fmt;

use crate::routing::error::RouteError;

/// One declared path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Matches exactly this literal.
    Static(String),
    /// Matches any literal, binding it under this name.
    Variable(String),
}

impl Segment {
    /// Parse a single declared segment.
    pub fn parse(raw: &str) -> Result<Self, String> {
        if let Some(inner) = raw.strip_prefix('{') {
            let name = inner
                .strip_suffix('}')
                .ok_or_else(|| format!("unterminated variable segment `{raw}`"))?;
            check_chars(name, raw)?;
            return Ok(Segment::Variable(name.to_string()));
        }
        check_chars(raw, raw)?;
        Ok(Segment::Static(raw.to_string()))
    }

    /// The literal or the variable name.
    pub fn name(&self) -> &str {
        match self {
            Segment::Static(s) | Segment::Variable(s) => s,
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Segment::Variable(_))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Static(s) => f.write_str(s),
            Segment::Variable(name) => write!(f, "{{{name}}}"),
        }
    }
}

fn check_chars(token: &str, raw: &str) -> Result<(), String> {
    if token.is_empty() {
        return Err(format!("empty segment `{raw}`"));
    }
    match token
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')))
    {
        Some(bad) => Err(format!("invalid character `{bad}` in segment `{raw}`")),
        None => Ok(()),
    }
}

/// Parse a declared absolute path into segments.
///
/// The leading `/` is mandatory and a single trailing `/` is ignored, so `/`
/// parses to no segments (the root).
pub fn parse_path(path: &str) -> Result<Vec<Segment>, RouteError> {
    let invalid = |reason: String| RouteError::InvalidPathSyntax {
        path: path.to_string(),
        reason,
    };

    let rest = path
        .strip_prefix('/')
        .ok_or_else(|| invalid("path must start with `/`".to_string()))?;
    let rest = rest.strip_suffix('/').unwrap_or(rest);
    if rest.is_empty() {
        return Ok(Vec::new());
    }
    rest.split('/')
        .map(|raw| Segment::parse(raw).map_err(invalid))
        .collect()
}

/// Split a request path for dispatch.
///
/// Unlike [`parse_path`] this never fails: request segments are matched, not
/// validated, and anything unmatchable simply ends in `NotFound`.
pub fn split_request_path(path: &str) -> Vec<&str> {
    let rest = path.strip_prefix('/').unwrap_or(path);
    let rest = rest.strip_suffix('/').unwrap_or(rest);
    if rest.is_empty() {
        Vec::new()
    } else {
        rest.split('/').collect()
    }
}

/// Render segments back into an absolute path.
pub fn join_segments(segments: &[Segment]) -> String {
    if segments.is_empty() {
        return "/".to_string();
    }
    segments.iter().fold(String::new(), |mut acc, s| {
        acc.push('/');
        acc.push_str(&s.to_string());
        acc
    })
}
