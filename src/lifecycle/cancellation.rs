//! Per-request cooperative cancellation.
//!
//! # Responsibilities
//! - One cancellation source per render, shared by data fetch and rendering
//! - Idempotent tripping with the first reason remembered
//! - Drop guards that trip when a request or response future goes away
//!
//! # Design Decisions
//! - Built on `tokio_util::sync::CancellationToken`
//! - Consumers only get an observe-only `CancellationSignal` (child token)
//! - Cooperative: work that ignores the signal still runs, its output is discarded

use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;

/// Why a render was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The request future was dropped (client went away mid-request).
    ClientAborted,
    /// The response body was dropped before writing finished.
    ResponseClosed,
    /// The render engine reported a fatal error.
    RenderFailed,
    /// An opt-in deadline expired.
    Deadline,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CancelReason::ClientAborted => "client_aborted",
            CancelReason::ResponseClosed => "response_closed",
            CancelReason::RenderFailed => "render_failed",
            CancelReason::Deadline => "deadline",
        };
        f.write_str(s)
    }
}

/// Owner side of a request's cancellation.
#[derive(Debug, Clone)]
pub struct CancellationSource {
    token: CancellationToken,
    reason: Arc<OnceLock<CancelReason>>,
}

impl CancellationSource {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            reason: Arc::new(OnceLock::new()),
        }
    }

    /// Trip the source. Returns `true` only for the call that actually tripped it.
    pub fn trip(&self, reason: CancelReason) -> bool {
        let first = self.reason.set(reason).is_ok();
        if first {
            tracing::debug!(reason = %reason, "Cancellation tripped");
        }
        self.token.cancel();
        first
    }

    pub fn is_tripped(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<CancelReason> {
        self.reason.get().copied()
    }

    /// Observe-only handle for downstream work.
    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            token: self.token.child_token(),
            reason: Arc::clone(&self.reason),
        }
    }

    /// Guard that trips with `reason` when dropped, unless disarmed first.
    pub fn trip_on_drop(&self, reason: CancelReason) -> TripGuard {
        TripGuard {
            source: Some(self.clone()),
            reason,
        }
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a `CancellationSource`.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    token: CancellationToken,
    reason: Arc<OnceLock<CancelReason>>,
}

impl CancellationSignal {
    pub fn is_canceled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<CancelReason> {
        self.reason.get().copied()
    }

    /// Resolves once the owning source trips.
    pub async fn canceled(&self) {
        self.token.cancelled().await
    }
}

/// Trips its source on drop. `disarm` detaches it.
#[derive(Debug)]
pub struct TripGuard {
    source: Option<CancellationSource>,
    reason: CancelReason,
}

impl TripGuard {
    /// Detach the trigger; dropping the guard afterwards does nothing.
    pub fn disarm(&mut self) {
        self.source = None;
    }

    pub fn is_armed(&self) -> bool {
        self.source.is_some()
    }
}

impl Drop for TripGuard {
    fn drop(&mut self) {
        if let Some(source) = self.source.take() {
            source.trip(self.reason);
        }
    }
}

/// Race `fut` against a deadline that trips `source` on expiry.
///
/// The pipeline imposes no deadline itself; callers opt in per call.
pub async fn with_deadline<T, F>(
    source: &CancellationSource,
    deadline: Duration,
    fut: F,
) -> Result<T, PipelineError>
where
    F: Future<Output = Result<T, PipelineError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            source.trip(CancelReason::Deadline);
            Err(PipelineError::timeout(format!(
                "deadline of {}ms exceeded",
                deadline.as_millis()
            )))
        }
    }
}
