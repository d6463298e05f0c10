//! The error record every stage raises.
//!
//! # Responsibilities
//! - Carry kind, status, internal and client-safe messages
//! - Preserve the root cause without exposing it to clients
//! - Normalize anything raised by collaborators into one shape

use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::sync::Arc;
use thiserror::Error;

use crate::error::kind::{ErrorKind, GENERIC_SAFE_MESSAGE};

/// Boxed error as produced by external collaborators.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Marker a collaborator can return when it stopped because it was asked to.
#[derive(Debug, Clone, Copy, Default, Error)]
#[error("operation canceled")]
pub struct Canceled;

/// Classified pipeline failure.
///
/// Immutable once built; the `with_*` methods consume and return.
#[derive(Debug, Clone)]
pub struct PipelineError {
    kind: ErrorKind,
    message: String,
    safe_message: String,
    http_status: u16,
    details: Option<Value>,
    cause: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl PipelineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let safe_message = if kind.exposes_message() {
            message.clone()
        } else {
            GENERIC_SAFE_MESSAGE.to_string()
        };
        Self {
            kind,
            message,
            safe_message,
            http_status: kind.default_status(),
            details: None,
            cause: None,
        }
    }

    pub fn infra(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Infra, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Upstream, message)
    }

    /// `domain` / 404.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Domain, message)
    }

    /// `validation` / 400.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// `auth` / 403.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn canceled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Canceled, message)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = status;
        self
    }

    pub fn with_safe_message(mut self, safe_message: impl Into<String>) -> Self {
        self.safe_message = safe_message.into();
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_cause(mut self, cause: impl Into<BoxError>) -> Self {
        self.cause = Some(Arc::from(cause.into()));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn safe_message(&self) -> &str {
        &self.safe_message
    }

    pub fn http_status(&self) -> u16 {
        self.http_status
    }

    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Normalize anything a collaborator raised.
    ///
    /// Existing `PipelineError`s pass through untouched, cancellation-shaped
    /// errors become `canceled`, everything else is wrapped as `fallback`
    /// with the original kept as the cause.
    pub fn from_unknown(value: impl Into<BoxError>, fallback: ErrorKind) -> Self {
        let boxed: BoxError = value.into();
        let boxed = match boxed.downcast::<PipelineError>() {
            Ok(classified) => return *classified,
            Err(other) => other,
        };

        if looks_canceled(boxed.as_ref()) {
            return Self::canceled(boxed.to_string()).with_cause(boxed);
        }

        let message = boxed.to_string();
        let message = if message.is_empty() {
            "unknown error".to_string()
        } else {
            message
        };
        Self::new(fallback, message).with_cause(boxed)
    }

    /// Normalize a bare message (the string equivalent of `from_unknown`).
    pub fn from_message(message: impl Into<String>, fallback: ErrorKind) -> Self {
        let message = message.into();
        if is_cancel_message(&message) {
            return Self::canceled(message);
        }
        Self::new(fallback, message)
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for PipelineError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

fn looks_canceled(err: &(dyn StdError + 'static)) -> bool {
    if err.is::<Canceled>() {
        return true;
    }
    if let Some(io_err) = err.downcast_ref::<io::Error>() {
        if matches!(
            io_err.kind(),
            io::ErrorKind::Interrupted | io::ErrorKind::ConnectionAborted
        ) {
            return true;
        }
    }
    is_cancel_message(&err.to_string())
}

fn is_cancel_message(message: &str) -> bool {
    let lower = message.trim().to_ascii_lowercase();
    matches!(
        lower.as_str(),
        "aborterror" | "aborted" | "canceled" | "cancelled" | "the operation was aborted"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_message_policy() {
        let err = PipelineError::not_found("user 42 missing");
        assert_eq!(err.safe_message(), "user 42 missing");
        assert_eq!(err.http_status(), 404);

        let err = PipelineError::infra("db password rejected");
        assert_eq!(err.safe_message(), GENERIC_SAFE_MESSAGE);
        assert_eq!(err.message(), "db password rejected");
    }

    #[test]
    fn test_status_override() {
        let err = PipelineError::bad_request("bad").with_status(422);
        assert_eq!(err.http_status(), 422);
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_from_unknown_passes_through() {
        let original = PipelineError::forbidden("nope").with_status(401);
        let normalized = PipelineError::from_unknown(original, ErrorKind::Infra);
        assert_eq!(normalized.kind(), ErrorKind::Auth);
        assert_eq!(normalized.http_status(), 401);
        assert!(normalized.cause().is_none());
    }

    #[test]
    fn test_from_unknown_detects_cancellation() {
        let err = PipelineError::from_unknown(Canceled, ErrorKind::Infra);
        assert_eq!(err.kind(), ErrorKind::Canceled);
        assert_eq!(err.http_status(), 499);

        let err = PipelineError::from_unknown("AbortError", ErrorKind::Upstream);
        assert_eq!(err.kind(), ErrorKind::Canceled);
    }

    #[test]
    fn test_from_unknown_wraps_with_fallback() {
        let io_err = io::Error::new(io::ErrorKind::Other, "disk on fire");
        let err = PipelineError::from_unknown(io_err, ErrorKind::Upstream);
        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert_eq!(err.message(), "disk on fire");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_from_message() {
        assert_eq!(
            PipelineError::from_message("aborted", ErrorKind::Infra).kind(),
            ErrorKind::Canceled
        );
        assert_eq!(
            PipelineError::from_message("boom", ErrorKind::Infra).kind(),
            ErrorKind::Infra
        );
    }
}
