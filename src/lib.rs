//! Server-side render pipeline.
//!
//! Resolves a request URL to a declared route, gathers the route's initial
//! data (directly or through a registered service), renders it with an
//! external UI engine and returns either a complete document or a
//! progressively streamed one.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http (axum + tower-http layers, trace id, CSP nonce)
//!                         │
//!                         ▼
//!                     render::RenderPipeline ──▶ routing (specificity-ordered matchers)
//!                         │
//!                         ├──▶ data (route handler → literal or service descriptor)
//!                         │        └──▶ services (registry + dispatcher)
//!                         │
//!                         ├──▶ render engine (RenderModule: buffered | streaming)
//!                         │
//!     Client Response ◀───┘  document / stream / 404 / abandoned
//!
//!     Cross-cutting: config (TOML + watcher), error (kinds, benign detection),
//!                    lifecycle (cancellation, shutdown), observability
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod render;
pub mod routing;
pub mod security;
pub mod services;

/// JSON object used for data snapshots, service arguments and route meta.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

pub use config::PipelineConfig;
pub use error::{ErrorKind, PipelineError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use render::{RenderOutcome, RenderPipeline, RenderRequest};
