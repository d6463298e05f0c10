//! Request-side middleware.
//!
//! # Responsibilities
//! - Resolve the trace id once per request and store it as an extension
//! - Echo it back in `x-trace-id` so callers can correlate logs
//!
//! # Design Decisions
//! - Request ids come from `tower_http`'s request-id layers, which run first
//! - Inbound trace ids are only trusted when they look like safe tokens

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use crate::services::{resolve_trace_id, X_TRACE_ID};

pub async fn trace_id_middleware(mut req: Request<Body>, next: Next) -> Response {
    let trace_id = resolve_trace_id(req.headers());
    req.extensions_mut().insert(trace_id.clone());

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(trace_id.as_str()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(X_TRACE_ID), value);
    }
    response
}
