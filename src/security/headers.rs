//! Content security policy with per-request nonces.
//!
//! # Responsibilities
//! - Generate a fresh random nonce for every request
//! - Render the configured policy with that nonce
//! - Hand the nonce to the render pipeline so inline scripts carry it
//!
//! # Design Decisions
//! - The policy template is checked once at startup; a bad header name or
//!   value fails configuration, not requests
//! - Responses that did not set the header themselves (404s, errors) get it here

use axum::{
    body::Body,
    extract::State,
    http::{header::InvalidHeaderValue, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;
use thiserror::Error;

use crate::config::SecurityConfig;

const NONCE_PLACEHOLDER: &str = "{nonce}";

/// Per-request policy, stored as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityPolicy {
    pub nonce: String,
    pub header_name: HeaderName,
    pub header_value: HeaderValue,
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid security header name '{0}'")]
    HeaderName(String),

    #[error("security policy is not a valid header value: {0}")]
    HeaderValue(#[from] InvalidHeaderValue),
}

/// Compiled policy template.
#[derive(Debug, Clone)]
pub struct PolicyTemplate {
    header_name: HeaderName,
    template: String,
}

impl PolicyTemplate {
    /// `None` when security headers are disabled.
    pub fn from_config(config: &SecurityConfig) -> Result<Option<Self>, PolicyError> {
        if !config.enabled {
            return Ok(None);
        }
        let header_name = HeaderName::from_bytes(config.header_name.as_bytes())
            .map_err(|_| PolicyError::HeaderName(config.header_name.clone()))?;
        let template = Self {
            header_name,
            template: config.policy.clone(),
        };
        template.render(&generate_nonce())?;
        Ok(Some(template))
    }

    pub fn render(&self, nonce: &str) -> Result<SecurityPolicy, PolicyError> {
        let value = self.template.replace(NONCE_PLACEHOLDER, nonce);
        Ok(SecurityPolicy {
            nonce: nonce.to_string(),
            header_name: self.header_name.clone(),
            header_value: HeaderValue::from_str(&value)?,
        })
    }
}

/// 128 random bits, base64 encoded.
pub fn generate_nonce() -> String {
    STANDARD.encode(rand::random::<[u8; 16]>())
}

/// Attach a fresh [`SecurityPolicy`] to the request and its header to the response.
pub async fn security_headers_middleware(
    State(template): State<Arc<PolicyTemplate>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let policy = match template.render(&generate_nonce()) {
        Ok(policy) => policy,
        Err(e) => {
            tracing::error!(error = %e, "Failed to render security policy");
            return next.run(req).await;
        }
    };
    req.extensions_mut().insert(policy.clone());

    let mut response = next.run(req).await;
    if !response.headers().contains_key(&policy.header_name) {
        response
            .headers_mut()
            .insert(policy.header_name, policy.header_value);
    }
    response
}
