//! Service registry and dispatch.
//!
//! # Data Flow
//! ```text
//! ServiceDescriptor { service, method, args }
//!     → dispatcher.rs (cancel check, lookup, invoke, time, log)
//!     → registry.rs (service → method → handler)
//!     → handler(params, RequestContext)
//!     → JSON object, or a normalized PipelineError
//! ```

pub mod context;
pub mod dispatcher;
pub mod registry;

pub use context::{resolve_trace_id, Identity, RequestContext, TraceId, X_REQUEST_ID, X_TRACE_ID};
pub use dispatcher::call_service_method;
pub use registry::{ServiceMethod, ServiceRegistry, ServiceRegistryBuilder};
