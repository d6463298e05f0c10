//! Benign network failure classification.
//!
//! A benign failure means the client went away (reset, broken pipe, early
//! close). Nothing useful can be sent back, so these are logged at `warn`
//! and never escalated.

use std::error::Error as StdError;
use std::io;

/// Message fragments that identify a torn-down connection (lowercase).
const BENIGN_PATTERNS: &[&str] = &[
    "econnreset",
    "epipe",
    "connection reset",
    "broken pipe",
    "socket hang up",
    "premature close",
    "aborted",
];

/// Bound on how far down a `source()` chain we look.
const MAX_CHAIN_DEPTH: usize = 16;

/// Case-insensitive check of a single message.
pub fn is_benign_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    BENIGN_PATTERNS.iter().any(|pattern| lower.contains(pattern))
}

/// Walk the error chain looking for a client-disconnect shape.
pub fn is_benign_network_error(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    let mut depth = 0;

    while let Some(e) = current {
        if depth >= MAX_CHAIN_DEPTH {
            break;
        }
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        if is_benign_message(&e.to_string()) {
            return true;
        }
        current = e.source();
        depth += 1;
    }

    false
}
