//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Per request (cancellation.rs):
//!     Render starts → CancellationSource created
//!     Client drops request / response closes / render fails → trip (first reason wins)
//!     Data fetch + render engine observe the CancellationSignal
//!
//! Process (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger → server stops accepting, drains, exits
//! ```
//!
//! # Design Decisions
//! - Cancellation is cooperative and per request, never shared across requests
//! - Shutdown is a broadcast so any number of tasks can wait on it

pub mod cancellation;
pub mod shutdown;
pub mod signals;

pub use cancellation::{with_deadline, CancelReason, CancellationSignal, CancellationSource, TripGuard};
pub use shutdown::Shutdown;
pub use signals::wait_for_shutdown_signal;
