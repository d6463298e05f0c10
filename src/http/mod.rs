//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, trace, timeout layers)
//!     → request.rs (trace id extension)
//!     → security headers (nonce)
//!     → fallback handler → RenderPipeline
//!     → response.rs (outcome / error → response)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::trace_id_middleware;
pub use response::{error_response, CLIENT_CLOSED_REQUEST};
pub use server::{spawn_config_reload, AppState, HttpServer};
