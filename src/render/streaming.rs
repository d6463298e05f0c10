//! Streaming response body.
//!
//! # Responsibilities
//! - Start the engine on the first body poll, after headers went out
//! - Hold body chunks back until the head is complete
//! - Emit the data snapshot and the template tail exactly once at the end
//! - Turn engine failures into a destroyed connection, never an error page
//!
//! # Lifecycle
//! ```text
//! Pending ─first poll─▶ Running ─HeadReady─▶ HeadWritten ─Finished─▶ Done
//!                          │                      │
//!                          └──────RenderError─────┴──▶ Aborted (stream ends with Err)
//! ```
//! Dropping the body before `Done` trips the request's cancellation source
//! with `ResponseClosed` and aborts the engine.

use bytes::Bytes;
use futures_util::stream::{self, Stream};
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::lifecycle::{CancelReason, CancellationSignal, CancellationSource, TripGuard};
use crate::render::document::data_ready_script;
use crate::render::failure::{classify_failure, teardown, FailureClass};
use crate::render::module::{RenderError, RenderModule, StreamControl, StreamingInput};
use crate::render::stream::{render_channel, RenderEvent, StreamWriter};
use crate::render::template::TemplateFragments;
use crate::JsonMap;

/// Pending engine events before the engine has to wait for the client.
const STREAM_CHANNEL_CAPACITY: usize = 16;

type BodyChunk = Result<Bytes, io::Error>;

/// Everything a streaming body needs to drive one render.
pub(crate) struct StreamSetup {
    pub module: Arc<dyn RenderModule>,
    pub input: StreamingInput,
    pub fragments: TemplateFragments,
    /// Stylesheet and preload links appended to the engine's head markup.
    pub head_links: String,
    pub nonce: Option<String>,
    pub source: CancellationSource,
    pub span: tracing::Span,
    pub url: String,
    pub route: String,
}

pub(crate) struct StreamingBody {
    pending: Option<(Arc<dyn RenderModule>, StreamWriter, StreamingInput)>,
    events: mpsc::Receiver<RenderEvent>,
    control: Option<Box<dyn StreamControl>>,
    fragments: TemplateFragments,
    head_links: String,
    nonce: Option<String>,
    /// Body chunks that arrived before the head.
    held: Vec<Bytes>,
    ready: VecDeque<Bytes>,
    snapshot: Option<JsonMap>,
    head_written: bool,
    aborted: bool,
    done: bool,
    source: CancellationSource,
    signal: CancellationSignal,
    close_guard: TripGuard,
    span: tracing::Span,
    url: String,
    route: String,
}

enum Next {
    Event(Option<RenderEvent>),
    Canceled,
}

impl StreamingBody {
    pub(crate) fn new(setup: StreamSetup) -> Self {
        let (writer, events) = render_channel(STREAM_CHANNEL_CAPACITY);
        let close_guard = setup.source.trip_on_drop(CancelReason::ResponseClosed);
        Self {
            pending: Some((setup.module, writer, setup.input)),
            events,
            control: None,
            fragments: setup.fragments,
            head_links: setup.head_links,
            nonce: setup.nonce,
            held: Vec::new(),
            ready: VecDeque::new(),
            snapshot: None,
            head_written: false,
            aborted: false,
            done: false,
            signal: setup.source.signal(),
            source: setup.source,
            close_guard,
            span: setup.span,
            url: setup.url,
            route: setup.route,
        }
    }

    pub(crate) fn into_stream(self) -> impl Stream<Item = BodyChunk> + Send + 'static {
        stream::unfold(self, |mut body| async move {
            let chunk = body.next_chunk().await?;
            Some((chunk, body))
        })
    }

    async fn next_chunk(&mut self) -> Option<BodyChunk> {
        loop {
            if let Some(chunk) = self.ready.pop_front() {
                return Some(Ok(chunk));
            }
            if self.done {
                if !self.aborted {
                    self.close_guard.disarm();
                }
                return None;
            }

            if let Some((module, writer, input)) = self.pending.take() {
                tracing::debug!(parent: &self.span, route = %self.route, "Starting streaming render");
                match module.render_streaming(writer, input) {
                    Ok(control) => self.control = Some(control),
                    Err(err) => return Some(self.fail(err)),
                }
                continue;
            }

            let next = tokio::select! {
                biased;
                event = self.events.recv() => Next::Event(event),
                _ = self.signal.canceled() => Next::Canceled,
            };

            match next {
                Next::Event(Some(RenderEvent::Chunk(bytes))) => {
                    if self.head_written {
                        self.ready.push_back(bytes);
                    } else {
                        self.held.push(bytes);
                    }
                }
                Next::Event(Some(RenderEvent::HeadReady(head))) => self.write_head(&head),
                Next::Event(Some(RenderEvent::AllDataReady(data))) => self.snapshot = Some(data),
                Next::Event(Some(RenderEvent::RenderError(err))) => return Some(self.fail(err)),
                Next::Event(Some(RenderEvent::Finished)) => self.finish(),
                Next::Event(None) => {
                    let err: RenderError = Box::new(io::Error::other(
                        "render engine dropped its stream writer before finishing",
                    ));
                    return Some(self.fail(err));
                }
                Next::Canceled => {
                    let reason = self
                        .signal
                        .reason()
                        .map(|r| r.to_string())
                        .unwrap_or_default();
                    let err: RenderError = Box::new(io::Error::new(
                        io::ErrorKind::ConnectionAborted,
                        format!("render aborted: {reason}"),
                    ));
                    return Some(self.fail(err));
                }
            }
        }
    }

    fn write_head(&mut self, head: &str) {
        if self.head_written {
            tracing::debug!(parent: &self.span, route = %self.route, "Duplicate head ignored");
            return;
        }
        let f = &self.fragments;
        let prefix = format!(
            "{}{}{}{}{}",
            f.before_head, head, self.head_links, f.after_head, f.before_body
        );
        self.ready.push_back(Bytes::from(prefix));
        self.ready.extend(self.held.drain(..));
        self.head_written = true;
    }

    fn finish(&mut self) {
        if self.aborted || self.done {
            return;
        }
        if !self.head_written {
            // Engine finished without a head; keep the document well formed.
            self.write_head("");
        }
        let data = self.snapshot.take().unwrap_or_default();
        let tail = format!(
            "{}{}",
            data_ready_script(&data, self.nonce.as_deref()),
            self.fragments.after_body
        );
        self.ready.push_back(Bytes::from(tail));
        self.done = true;
        tracing::debug!(parent: &self.span, route = %self.route, "Streaming render finished");
    }

    /// Abort the render. The returned error ends the body, which makes the
    /// server drop the connection without an error page.
    fn fail(&mut self, err: RenderError) -> BodyChunk {
        self.aborted = true;
        self.done = true;
        self.ready.clear();

        match classify_failure(err.as_ref(), &self.signal) {
            FailureClass::Benign => {
                tracing::warn!(
                    parent: &self.span,
                    route = %self.route,
                    url = %self.url,
                    error = %err,
                    "Streaming render interrupted, client disconnected"
                );
                self.stop_engine();
                Err(io::Error::new(io::ErrorKind::ConnectionAborted, err))
            }
            FailureClass::Fatal => {
                tracing::error!(
                    parent: &self.span,
                    route = %self.route,
                    url = %self.url,
                    error = %err,
                    "Streaming render failed"
                );
                self.source.trip(CancelReason::RenderFailed);
                self.stop_engine();
                Err(io::Error::other(err))
            }
        }
    }

    fn stop_engine(&mut self) {
        if let Some(control) = self.control.take() {
            teardown(control.as_ref(), &self.span);
        }
    }
}

impl Drop for StreamingBody {
    fn drop(&mut self) {
        if !self.done {
            tracing::debug!(
                parent: &self.span,
                route = %self.route,
                "Response closed before streaming finished"
            );
            self.source.trip(CancelReason::ResponseClosed);
            self.stop_engine();
        }
    }
}
