//! Error kinds and their HTTP status policy.

use serde::{Deserialize, Serialize};

/// Closed set of failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Misconfiguration or internal defect.
    Infra,
    /// A dependency answered badly.
    Upstream,
    /// Business-level absence or conflict ("not found").
    Domain,
    /// Malformed input.
    Validation,
    /// Caller is not allowed to do this.
    Auth,
    /// A deadline expired.
    Timeout,
    /// The request was abandoned before completion.
    Canceled,
}

/// Message returned to clients for kinds that must not expose internals.
pub const GENERIC_SAFE_MESSAGE: &str = "An unexpected error occurred";

impl ErrorKind {
    /// Default HTTP status for this kind.
    pub fn default_status(self) -> u16 {
        match self {
            ErrorKind::Infra => 500,
            ErrorKind::Upstream => 502,
            ErrorKind::Domain => 404,
            ErrorKind::Validation => 400,
            ErrorKind::Auth => 403,
            ErrorKind::Timeout => 504,
            ErrorKind::Canceled => 499,
        }
    }

    /// Whether the original message is safe to show to an untrusted client.
    pub fn exposes_message(self) -> bool {
        matches!(self, ErrorKind::Domain | ErrorKind::Validation | ErrorKind::Auth)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Infra => "infra",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Domain => "domain",
            ErrorKind::Validation => "validation",
            ErrorKind::Auth => "auth",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_statuses() {
        assert_eq!(ErrorKind::Infra.default_status(), 500);
        assert_eq!(ErrorKind::Upstream.default_status(), 502);
        assert_eq!(ErrorKind::Domain.default_status(), 404);
        assert_eq!(ErrorKind::Validation.default_status(), 400);
        assert_eq!(ErrorKind::Auth.default_status(), 403);
        assert_eq!(ErrorKind::Timeout.default_status(), 504);
        assert_eq!(ErrorKind::Canceled.default_status(), 499);
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&ErrorKind::Canceled).unwrap();
        assert_eq!(json, "\"canceled\"");
        let kind: ErrorKind = serde_json::from_str("\"upstream\"").unwrap();
        assert_eq!(kind, ErrorKind::Upstream);
    }
}
