//! Classification of render failures.
//!
//! A failure is benign when the client is already gone (or the request was
//! otherwise abandoned); it is logged as a warning and the response is
//! dropped. Anything else is fatal and surfaces as an error.

use serde_json::json;
use std::error::Error as StdError;
use std::panic::{self, AssertUnwindSafe};

use crate::error::{is_benign_network_error, Canceled, ErrorKind, PipelineError};
use crate::lifecycle::CancellationSignal;
use crate::render::module::{RenderError, StreamControl};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Benign,
    Fatal,
}

pub fn classify_failure(err: &(dyn StdError + 'static), signal: &CancellationSignal) -> FailureClass {
    let canceled = err.is::<Canceled>()
        || err
            .downcast_ref::<PipelineError>()
            .is_some_and(|e| e.kind() == ErrorKind::Canceled);

    if signal.is_canceled() || canceled || is_benign_network_error(err) {
        FailureClass::Benign
    } else {
        FailureClass::Fatal
    }
}

/// Turn an engine failure into a pipeline error, keeping existing classifications.
pub fn escalate(err: RenderError, url: &str, route: &str) -> PipelineError {
    match err.downcast::<PipelineError>() {
        Ok(classified) => *classified,
        Err(other) => PipelineError::infra(format!("render failed: {other}"))
            .with_details(json!({ "url": url, "route": route }))
            .with_cause(other),
    }
}

/// Abort an engine render. Failures, panics included, are only logged.
pub(crate) fn teardown(control: &dyn StreamControl, span: &tracing::Span) {
    match panic::catch_unwind(AssertUnwindSafe(|| control.abort())) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            tracing::debug!(parent: span, error = %err, "Render abort failed during teardown");
        }
        Err(_) => {
            tracing::debug!(parent: span, "Render abort panicked during teardown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{CancelReason, CancellationSource};
    use std::io;

    #[test]
    fn test_network_errors_are_benign() {
        let signal = CancellationSource::new().signal();
        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer");
        assert_eq!(classify_failure(&reset, &signal), FailureClass::Benign);

        let pipe = io::Error::other("write EPIPE");
        assert_eq!(classify_failure(&pipe, &signal), FailureClass::Benign);
    }

    #[test]
    fn test_tripped_signal_makes_anything_benign() {
        let source = CancellationSource::new();
        let signal = source.signal();
        let boom = io::Error::other("template exploded");
        assert_eq!(classify_failure(&boom, &signal), FailureClass::Fatal);

        source.trip(CancelReason::ClientAborted);
        assert_eq!(classify_failure(&boom, &signal), FailureClass::Benign);
    }

    #[test]
    fn test_canceled_pipeline_error_is_benign() {
        let signal = CancellationSource::new().signal();
        let err = PipelineError::canceled("request canceled before service call");
        assert_eq!(classify_failure(&err, &signal), FailureClass::Benign);
        assert_eq!(classify_failure(&Canceled, &signal), FailureClass::Benign);
    }

    #[test]
    fn test_escalate_keeps_classified_errors() {
        let err = escalate(Box::new(PipelineError::not_found("no user")), "/u/1", "/u/:id");
        assert_eq!(err.kind(), ErrorKind::Domain);

        let err = escalate(Box::new(io::Error::other("boom")), "/u/1", "/u/:id");
        assert_eq!(err.kind(), ErrorKind::Infra);
        assert_eq!(err.details().unwrap()["route"], "/u/:id");
        assert!(err.cause().is_some());
    }

    struct Exploding;

    impl StreamControl for Exploding {
        fn abort(&self) -> Result<(), RenderError> {
            panic!("abort exploded")
        }
    }

    struct Refusing;

    impl StreamControl for Refusing {
        fn abort(&self) -> Result<(), RenderError> {
            Err("already finished".into())
        }
    }

    #[test]
    fn test_teardown_swallows_failures() {
        let span = tracing::Span::none();
        teardown(&Exploding, &span);
        teardown(&Refusing, &span);
    }
}
