//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Detect duplicate or empty app ids
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PipelineConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::PipelineConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("invalid metrics address '{0}'")]
    InvalidMetricsAddress(String),

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("app #{0} has an empty id")]
    EmptyAppId(usize),

    #[error("duplicate app id '{0}'")]
    DuplicateAppId(String),

    #[error("security.policy is empty while security is enabled")]
    EmptySecurityPolicy,
}

pub fn validate_config(config: &PipelineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    let mut seen = HashSet::new();
    for (idx, app) in config.apps.iter().enumerate() {
        if app.id.trim().is_empty() {
            errors.push(ValidationError::EmptyAppId(idx));
        } else if !seen.insert(app.id.as_str()) {
            errors.push(ValidationError::DuplicateAppId(app.id.clone()));
        }
    }

    if config.security.enabled && config.security.policy.trim().is_empty() {
        errors.push(ValidationError::EmptySecurityPolicy);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
