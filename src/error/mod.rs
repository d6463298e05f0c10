//! Error taxonomy shared by every pipeline stage.
//!
//! # Data Flow
//! ```text
//! failure anywhere (handler, service, render engine, config)
//!     → record.rs (PipelineError: kind, status, safe message, cause)
//!     → benign.rs (client-gone vs. genuine defect)
//!     → serialize.rs (log/JSON rendering of the cause chain)
//!     → http::response (status + safe message to the client)
//! ```
//!
//! # Design Decisions
//! - Closed set of kinds, each with a default HTTP status
//! - Internal messages never reach clients for infra/upstream/timeout/canceled
//! - Route-not-found is a resolver return value, not an error

pub mod benign;
pub mod kind;
pub mod record;
pub mod serialize;

pub use benign::{is_benign_message, is_benign_network_error};
pub use kind::ErrorKind;
pub use record::{BoxError, Canceled, PipelineError, PipelineResult};
