//! Server-side render subsystem.
//!
//! # Data Flow
//! ```text
//! RenderRequest
//!     → orchestrator.rs (route, app, cancellation, mode)
//!     → Buffered:  template.rs split → data fetch → engine → document.rs assemble
//!     → Streaming: template.rs split → streaming.rs body fed by stream.rs events
//!     → failure.rs classifies anything that goes wrong
//! ```
//!
//! # Design Decisions
//! - The UI engine is a trait object (`module.rs`); nothing here knows its library
//! - Initial data is embedded with `<` escaped so it cannot end its script tag
//! - Client disconnects are expected and never produce an error response

pub mod assets;
pub mod document;
pub mod echo;
pub mod failure;
pub mod module;
pub mod orchestrator;
pub mod stream;
pub(crate) mod streaming;
pub mod template;

pub use assets::{AppAssets, AssetLookup, AssetRegistry, DevModuleLoader};
pub use document::{bootstrap_script, data_script, serialize_initial_data};
pub use echo::EchoRenderModule;
pub use failure::{classify_failure, FailureClass};
pub use module::{
    BufferedInput, DataInput, RenderError, RenderModule, RenderedDocument, StreamControl,
    StreamingInput,
};
pub use orchestrator::{Deployment, RenderOutcome, RenderPipeline, RenderRequest};
pub use stream::{render_channel, RenderEvent, StreamClosed, StreamWriter};
pub use template::TemplateFragments;
