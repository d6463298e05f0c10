//! Contract with the external rendering engine.
//!
//! The engine turns a data snapshot into markup. It is reached only through
//! [`RenderModule`]; the pipeline never knows which UI library sits behind it.

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::future::Future;

use crate::error::{BoxError, PipelineError};
use crate::lifecycle::CancellationSignal;
use crate::render::stream::StreamWriter;
use crate::JsonMap;

/// Errors raised by the engine. Classified by the orchestrator.
pub type RenderError = BoxError;

/// Output of a buffered render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedDocument {
    /// Markup for the document head.
    pub head: String,
    /// Markup for the application root.
    pub body: String,
}

pub struct BufferedInput<'a> {
    pub data: &'a JsonMap,
    pub url: &'a str,
    pub meta: Option<&'a JsonMap>,
    pub signal: CancellationSignal,
}

/// Initial data for a streaming render, resolved when the engine asks for it.
pub struct DataInput(BoxFuture<'static, Result<JsonMap, PipelineError>>);

impl DataInput {
    pub fn new(fut: impl Future<Output = Result<JsonMap, PipelineError>> + Send + 'static) -> Self {
        Self(Box::pin(fut))
    }

    pub fn ready(data: JsonMap) -> Self {
        Self::new(async move { Ok(data) })
    }

    pub async fn resolve(self) -> Result<JsonMap, PipelineError> {
        self.0.await
    }
}

pub struct StreamingInput {
    pub data: DataInput,
    pub url: String,
    /// Client bootstrap module; `None` when hydration is off or unknown.
    pub bootstrap_module: Option<String>,
    pub meta: JsonMap,
    pub nonce: Option<String>,
    pub signal: CancellationSignal,
}

/// Handle for stopping an in-flight streaming render.
pub trait StreamControl: Send + Sync {
    fn abort(&self) -> Result<(), RenderError>;
}

impl StreamControl for tokio::task::AbortHandle {
    fn abort(&self) -> Result<(), RenderError> {
        tokio::task::AbortHandle::abort(self);
        Ok(())
    }
}

/// A rendering engine entry point for one application.
#[async_trait]
pub trait RenderModule: Send + Sync {
    /// Render the whole document at once.
    async fn render_buffered(&self, input: BufferedInput<'_>) -> Result<RenderedDocument, RenderError>;

    /// Start a streaming render that reports through `writer`.
    ///
    /// Must return promptly; the actual rendering runs in the background and
    /// signals `head_ready`, body chunks, `all_data_ready` and `finish` (or
    /// `error`) on the writer.
    fn render_streaming(
        &self,
        writer: StreamWriter,
        input: StreamingInput,
    ) -> Result<Box<dyn StreamControl>, RenderError>;
}
