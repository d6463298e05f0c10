//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → matcher.rs (normalize, decode, specificity-ordered scan)
//!     → Return: RouteMatch { route, params } or None
//!
//! Route compilation (startup / reload):
//!     Route[]
//!     → pattern.rs (regex + param keys + specificity)
//!     → sort by specificity (stable)
//!     → router.rs (freeze, swap in atomically)
//! ```
//!
//! # Design Decisions
//! - Routes compiled once, immutable at runtime
//! - Static > required param > optional/wildcard
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod pattern;
pub mod route;
pub mod router;

pub use matcher::{
    build_matchers, decode_segment, has_file_extension, match_all, match_path, normalize_path,
    Params, RouteMatch, RouteMatcher,
};
pub use route::{BufferedAttributes, RenderMode, Route, RouteAttributes, StreamingAttributes};
pub use router::RouteTable;
