//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (fresh nonce, SecurityPolicy extension)
//!     → render pipeline (nonce on inline scripts, policy header on documents)
//! ```
//!
//! # Design Decisions
//! - No trust in client input: nonces are generated server side per request

pub mod headers;

pub use headers::{
    generate_nonce, security_headers_middleware, PolicyError, PolicyTemplate, SecurityPolicy,
};
