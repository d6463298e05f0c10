//! Event channel between a streaming render and the orchestrator.
//!
//! The engine reports progress as [`RenderEvent`]s instead of invoking
//! callbacks; the orchestrator consumes them as a small state machine.
//! The channel is bounded, so a slow client slows the engine down.

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::render::module::RenderError;
use crate::JsonMap;

/// Progress reported by a streaming render.
#[derive(Debug)]
pub enum RenderEvent {
    /// Body bytes, in document order.
    Chunk(Bytes),
    /// Head markup is complete; body bytes may now be flushed.
    HeadReady(String),
    /// Final data snapshot, written after all body content.
    AllDataReady(JsonMap),
    RenderError(RenderError),
    /// The engine wrote its last byte.
    Finished,
}

/// The response side went away.
#[derive(Debug, Clone, Copy, Error)]
#[error("premature close: response stream is gone")]
pub struct StreamClosed;

/// Engine-facing writer.
#[derive(Debug, Clone)]
pub struct StreamWriter {
    tx: mpsc::Sender<RenderEvent>,
}

/// Create a writer/receiver pair with room for `capacity` pending events.
pub fn render_channel(capacity: usize) -> (StreamWriter, mpsc::Receiver<RenderEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    (StreamWriter { tx }, rx)
}

impl StreamWriter {
    pub async fn write(&self, chunk: impl Into<Bytes>) -> Result<(), StreamClosed> {
        self.send(RenderEvent::Chunk(chunk.into())).await
    }

    pub async fn head_ready(&self, head: impl Into<String>) -> Result<(), StreamClosed> {
        self.send(RenderEvent::HeadReady(head.into())).await
    }

    pub async fn all_data_ready(&self, data: JsonMap) -> Result<(), StreamClosed> {
        self.send(RenderEvent::AllDataReady(data)).await
    }

    pub async fn error(&self, err: impl Into<RenderError>) -> Result<(), StreamClosed> {
        self.send(RenderEvent::RenderError(err.into())).await
    }

    pub async fn finish(self) -> Result<(), StreamClosed> {
        self.send(RenderEvent::Finished).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&self, event: RenderEvent) -> Result<(), StreamClosed> {
        self.tx.send(event).await.map_err(|_| StreamClosed)
    }
}
