//! Per-request context handed to data handlers and service methods.

use axum::http::HeaderMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::lifecycle::CancellationSignal;
use crate::JsonMap;

/// Inbound header carrying a caller-supplied trace id.
pub const X_TRACE_ID: &str = "x-trace-id";
/// Request id header populated by the request-id layer.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Resolved trace id, stored as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceId(pub String);

impl TraceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authenticated caller, attached by an upstream auth layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub subject: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub claims: JsonMap,
}

fn safe_token() -> &'static Regex {
    static SAFE_TOKEN: OnceLock<Regex> = OnceLock::new();
    SAFE_TOKEN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._:-]{1,128}$").expect("trace id pattern is valid")
    })
}

/// Pick the trace id: safe `x-trace-id`, else safe `x-request-id`, else a new UUID.
///
/// Both headers may come straight from the client, so both must pass the
/// safe-token check before they reach logs and response bodies.
pub fn resolve_trace_id(headers: &HeaderMap) -> TraceId {
    let safe_header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| safe_token().is_match(v))
    };

    safe_header(X_TRACE_ID)
        .or_else(|| safe_header(X_REQUEST_ID))
        .map(|id| TraceId(id.to_string()))
        .unwrap_or_else(|| TraceId(Uuid::new_v4().to_string()))
}

/// Context for one request's data fetch and service calls.
///
/// Created fresh per request and never shared across requests.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub trace_id: String,
    /// Scoped logger: events recorded with `parent: &ctx.span` carry the
    /// request's trace id.
    pub span: tracing::Span,
    pub headers: HashMap<String, String>,
    pub signal: Option<CancellationSignal>,
    pub user: Option<Identity>,
}

impl RequestContext {
    pub fn new(trace_id: impl Into<String>) -> Self {
        let trace_id = trace_id.into();
        let span = tracing::info_span!("request", trace_id = %trace_id);
        Self {
            trace_id,
            span,
            headers: HashMap::new(),
            signal: None,
            user: None,
        }
    }

    /// Copy textual headers (lowercased names) into the context.
    pub fn with_headers(mut self, headers: &HeaderMap) -> Self {
        self.headers = headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        self
    }

    pub fn with_signal(mut self, signal: CancellationSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn with_user(mut self, user: Option<Identity>) -> Self {
        self.user = user;
        self
    }

    pub fn is_canceled(&self) -> bool {
        self.signal.as_ref().is_some_and(|s| s.is_canceled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_safe_inbound_trace_id_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(X_TRACE_ID, HeaderValue::from_static("abc-123.def"));
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("req-1"));
        assert_eq!(resolve_trace_id(&headers).as_str(), "abc-123.def");
    }

    #[test]
    fn test_unsafe_inbound_falls_back_to_request_id() {
        let mut headers = HeaderMap::new();
        headers.insert(X_TRACE_ID, HeaderValue::from_static("<script>alert(1)</script>"));
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("req-1"));
        assert_eq!(resolve_trace_id(&headers).as_str(), "req-1");

        // A client-supplied request id gets the same check.
        let oversized = format!("evil\" injected=1 {}", "A".repeat(4000));
        headers.insert(X_REQUEST_ID, HeaderValue::from_str(&oversized).unwrap());
        let id = resolve_trace_id(&headers);
        assert!(Uuid::parse_str(id.as_str()).is_ok());

        headers.insert(X_REQUEST_ID, HeaderValue::from_str(&"a".repeat(129)).unwrap());
        assert!(Uuid::parse_str(resolve_trace_id(&headers).as_str()).is_ok());
    }

    #[test]
    fn test_generates_uuid_when_nothing_usable() {
        let headers = HeaderMap::new();
        let id = resolve_trace_id(&headers);
        assert!(Uuid::parse_str(id.as_str()).is_ok());
    }

    #[test]
    fn test_context_headers_are_copied() {
        let mut headers = HeaderMap::new();
        headers.insert("Accept-Language", HeaderValue::from_static("en"));
        let ctx = RequestContext::new("t").with_headers(&headers);
        assert_eq!(ctx.headers.get("accept-language").map(String::as_str), Some("en"));
        assert!(!ctx.is_canceled());
    }
}
