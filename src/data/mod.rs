//! Initial data resolution.
//!
//! # Data Flow
//! ```text
//! matched route + params
//!     → handler.rs (route's data handler, optional)
//!     → descriptor.rs (literal data or service descriptor?)
//!     → fetch.rs (return literal / dispatch descriptor via services)
//!     → JSON object handed to the render stage
//! ```

pub mod descriptor;
pub mod fetch;
pub mod handler;

pub use descriptor::{DataResult, ServiceDescriptor};
pub use fetch::fetch_initial_data;
pub use handler::DataHandler;
