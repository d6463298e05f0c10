//! Route matching logic.
//!
//! # Responsibilities
//! - Compile a route set into matchers sorted by specificity
//! - Normalize request paths (drop query/fragment, empty → `/`)
//! - Match paths and extract percent-decoded parameters
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Most specific pattern wins; equal specificity keeps declaration order
//! - Decoding never fails: malformed escapes pass through verbatim
//! - Matching never fails: no match is `None`

use regex::Regex;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::PipelineError;
use crate::routing::pattern::compile;
use crate::routing::route::Route;

/// Path parameters extracted from a match.
pub type Params = BTreeMap<String, String>;

/// A route compiled for matching. Immutable once built.
#[derive(Debug, Clone)]
pub struct RouteMatcher {
    route: Arc<Route>,
    regex: Regex,
    param_keys: Vec<String>,
    specificity: u32,
}

impl RouteMatcher {
    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    pub fn param_keys(&self) -> &[String] {
        &self.param_keys
    }

    pub fn specificity(&self) -> u32 {
        self.specificity
    }

    /// Structural match against an already normalized path.
    fn try_match(&self, path: &str) -> Option<RouteMatch> {
        let captures = self.regex.captures(path)?;
        let mut params = Params::new();
        for (idx, key) in self.param_keys.iter().enumerate() {
            if let Some(value) = captures.get(idx + 1) {
                params.insert(key.clone(), decode_segment(value.as_str()).into_owned());
            }
        }
        Some(RouteMatch {
            route: Arc::clone(&self.route),
            params,
        })
    }
}

/// Result of a successful match.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<Route>,
    pub params: Params,
}

/// Compile routes into matchers, most specific first.
pub fn build_matchers(
    routes: impl IntoIterator<Item = Route>,
) -> Result<Vec<RouteMatcher>, PipelineError> {
    let mut matchers = Vec::new();
    for route in routes {
        let compiled = compile(&route.path).map_err(|e| {
            PipelineError::bad_request(e.to_string())
                .with_details(serde_json::json!({ "pattern": route.path }))
        })?;
        matchers.push(RouteMatcher {
            route: Arc::new(route),
            regex: compiled.regex,
            param_keys: compiled.param_keys,
            specificity: compiled.specificity,
        });
    }
    // Stable: equal specificity keeps declaration order.
    matchers.sort_by(|a, b| b.specificity.cmp(&a.specificity));
    Ok(matchers)
}

/// First match in specificity order.
pub fn match_path(path: &str, matchers: &[RouteMatcher]) -> Option<RouteMatch> {
    let path = normalize_path(path);
    matchers.iter().find_map(|m| m.try_match(path))
}

/// Every structural match, most specific first. Diagnostics only.
pub fn match_all(path: &str, matchers: &[RouteMatcher]) -> Vec<RouteMatch> {
    let path = normalize_path(path);
    matchers.iter().filter_map(|m| m.try_match(path)).collect()
}

/// Drop query string and fragment; an empty path becomes `/`.
pub fn normalize_path(raw: &str) -> &str {
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    let path = &raw[..end];
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

/// Percent-decode a path segment.
///
/// Invalid escapes are left as-is; if the decoded bytes are not UTF-8 the
/// segment is returned verbatim.
pub fn decode_segment(segment: &str) -> Cow<'_, str> {
    if !segment.contains('%') {
        return Cow::Borrowed(segment);
    }

    let bytes = segment.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                decoded.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }

    match String::from_utf8(decoded) {
        Ok(s) => Cow::Owned(s),
        Err(_) => Cow::Borrowed(segment),
    }
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Whether the last path segment looks like a file (`name.ext`).
pub fn has_file_extension(path: &str) -> bool {
    let path = normalize_path(path);
    let last = path.rsplit('/').next().unwrap_or("");
    match last.rfind('.') {
        Some(idx) => idx + 1 < last.len(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routes(patterns: &[&str]) -> Vec<RouteMatcher> {
        build_matchers(patterns.iter().map(|p| Route::new(*p))).unwrap()
    }

    #[test]
    fn test_static_beats_param_on_overlap() {
        // Declared param-first on purpose: ordering must come from specificity.
        let matchers = routes(&["/a/:id", "/a/static"]);
        let m = match_path("/a/static", &matchers).unwrap();
        assert_eq!(m.route.path, "/a/static");
        assert!(m.params.is_empty());

        let m = match_path("/a/other", &matchers).unwrap();
        assert_eq!(m.route.path, "/a/:id");
        assert_eq!(m.params["id"], "other");
    }

    #[test]
    fn test_equal_specificity_keeps_declaration_order() {
        let matchers = routes(&["/x/:a", "/x/:b"]);
        let m = match_path("/x/1", &matchers).unwrap();
        assert_eq!(m.route.path, "/x/:a");
    }

    #[test]
    fn test_query_and_fragment_ignored() {
        let matchers = routes(&["/users/:id"]);
        let m = match_path("/users/42?tab=posts#top", &matchers).unwrap();
        assert_eq!(m.params["id"], "42");
    }

    #[test]
    fn test_empty_path_is_root() {
        let matchers = routes(&["/"]);
        assert!(match_path("", &matchers).is_some());
        assert!(match_path("?x=1", &matchers).is_some());
    }

    #[test]
    fn test_params_are_decoded() {
        let matchers = routes(&["/search/:term"]);
        let m = match_path("/search/hello%20world", &matchers).unwrap();
        assert_eq!(m.params["term"], "hello world");
    }

    #[test]
    fn test_malformed_escape_passes_through() {
        let matchers = routes(&["/files/:name"]);
        let m = match_path("/files/100%zz", &matchers).unwrap();
        assert_eq!(m.params["name"], "100%zz");

        let m = match_path("/files/50%", &matchers).unwrap();
        assert_eq!(m.params["name"], "50%");

        // Decodes to invalid UTF-8: verbatim.
        let m = match_path("/files/%ff%fe", &matchers).unwrap();
        assert_eq!(m.params["name"], "%ff%fe");
    }

    #[test]
    fn test_optional_and_wildcard() {
        let matchers = routes(&["/docs/:page?", "/assets/*"]);

        let m = match_path("/docs", &matchers).unwrap();
        assert!(m.params.get("page").is_none());
        let m = match_path("/docs/intro", &matchers).unwrap();
        assert_eq!(m.params["page"], "intro");

        let m = match_path("/assets/js/app/main", &matchers).unwrap();
        assert_eq!(m.params["*"], "js/app/main");
    }

    #[test]
    fn test_no_match_is_none() {
        let matchers = routes(&["/users/:id"]);
        assert!(match_path("/nope", &matchers).is_none());
        assert!(match_path("/users", &matchers).is_none());
    }

    #[test]
    fn test_match_all_lists_overlaps_in_order() {
        let matchers = routes(&["/*", "/a/:id", "/a/static"]);
        let all = match_all("/a/static", &matchers);
        let paths: Vec<_> = all.iter().map(|m| m.route.path.as_str()).collect();
        assert_eq!(paths, vec!["/a/static", "/a/:id", "/*"]);
    }

    #[test]
    fn test_invalid_pattern_is_validation_error() {
        let err = build_matchers(vec![Route::new("/bad/:9")]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }

    #[test]
    fn test_file_extension_detection() {
        assert!(has_file_extension("/assets/app.js"));
        assert!(has_file_extension("/favicon.ico?v=2"));
        assert!(!has_file_extension("/users/42"));
        assert!(!has_file_extension("/trailing."));
        assert!(!has_file_extension("/"));
    }
}
