//! Path normalization and template parsing.

use std::collections::HashSet;

use boom_core::{BoomError, BoomResult};

/// One parsed segment of a route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    /// A literal segment.
    Static(String),
    /// `:name`, captures exactly one segment.
    Param(String),
    /// `*name`, captures the rest of the path.
    Wildcard(String),
}

/// Normalizes a template or request path.
///
/// Surrounding whitespace is stripped, a leading slash is enforced, repeated
/// slashes collapse, and a trailing slash is removed except on the root. When
/// a version is given, `/v{version}` is prefixed; the version may be supplied
/// as `1`, `v1` or `/v1`.
pub fn normalize(uri: &str, version: Option<&str>) -> String {
    let uri = uri.trim();
    let version = version
        .map(|v| v.trim().trim_matches('/'))
        .map(|v| v.strip_prefix('v').unwrap_or(v))
        .filter(|v| !v.is_empty());

    let mut out = String::with_capacity(uri.len() + 4);
    if let Some(version) = version {
        out.push_str("/v");
        out.push_str(version);
    }
    for segment in uri.split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Splits a normalized path into its segments; the root has none.
pub(crate) fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Parses a normalized template.
pub(crate) fn parse_template(uri: &str) -> BoomResult<Vec<Segment>> {
    let raw = segments(uri);
    let mut seen = HashSet::new();
    let mut parsed = Vec::with_capacity(raw.len());

    for (i, segment) in raw.iter().enumerate() {
        let parsed_segment = if let Some(name) = segment.strip_prefix(':') {
            Segment::Param(capture_name(uri, name)?)
        } else if let Some(name) = segment.strip_prefix('*') {
            if i + 1 != raw.len() {
                return Err(BoomError::invalid_route(
                    uri,
                    format!("wildcard `*{name}` must be the last segment"),
                ));
            }
            Segment::Wildcard(capture_name(uri, name)?)
        } else {
            Segment::Static((*segment).to_string())
        };

        if let Segment::Param(name) | Segment::Wildcard(name) = &parsed_segment
            && !seen.insert(name.clone())
        {
            return Err(BoomError::invalid_route(
                uri,
                format!("parameter `{name}` is declared more than once"),
            ));
        }
        parsed.push(parsed_segment);
    }

    Ok(parsed)
}

fn capture_name(uri: &str, name: &str) -> BoomResult<String> {
    if name.is_empty() || name.contains([':', '*']) {
        return Err(BoomError::invalid_route(
            uri,
            format!("invalid capture name `{name}`"),
        ));
    }
    Ok(name.to_string())
}
