//! Structured logging setup.
//!
//! # Responsibilities
//! - Build the `tracing_subscriber` registry (env filter + fmt or JSON output)
//! - Drop events whose message matches configured noise patterns
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the configured level
//! - Suppression is a layer on this subscriber only; nothing global is patched

use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::ObservabilityConfig;

/// Drops events whose `message` contains one of the configured patterns.
#[derive(Debug, Clone, Default)]
pub struct SuppressFilter {
    patterns: Vec<String>,
}

impl SuppressFilter {
    pub fn new(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            patterns: patterns
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    pub fn suppresses(&self, message: &str) -> bool {
        self.patterns.iter().any(|p| message.contains(p.as_str()))
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        }
    }
}

impl<S> Layer<S> for SuppressFilter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn event_enabled(&self, event: &Event<'_>, _ctx: Context<'_, S>) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        !visitor
            .message
            .as_deref()
            .is_some_and(|message| self.suppresses(message))
    }
}

/// Install the global subscriber.
pub fn init(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let suppress = SuppressFilter::new(config.suppressed_patterns.iter().cloned());

    let fmt_layer = if config.json_logs {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(suppress)
        .with(fmt_layer)
        .try_init()
}

#[cfg(test)]
pub(crate) mod capture {
    use super::MessageVisitor;
    use std::sync::{Arc, Mutex};
    use tracing::subscriber::DefaultGuard;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Records the level and message of every event it sees.
    #[derive(Clone, Default)]
    pub(crate) struct Captured(Arc<Mutex<Vec<(Level, String)>>>);

    impl Captured {
        /// Capture everything logged on this thread until the guard drops.
        pub(crate) fn install() -> (Self, DefaultGuard) {
            let captured = Self::default();
            let guard =
                tracing::subscriber::set_default(tracing_subscriber::registry().with(captured.clone()));
            (captured, guard)
        }

        pub(crate) fn messages(&self) -> Vec<String> {
            self.0.lock().unwrap().iter().map(|(_, m)| m.clone()).collect()
        }

        pub(crate) fn logged(&self, level: Level, message: &str) -> bool {
            self.0
                .lock()
                .unwrap()
                .iter()
                .any(|(l, m)| *l == level && m.contains(message))
        }

        pub(crate) fn count(&self, level: Level) -> usize {
            self.0.lock().unwrap().iter().filter(|(l, _)| *l == level).count()
        }
    }

    impl<S: Subscriber> Layer<S> for Captured {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut visitor = MessageVisitor::default();
            event.record(&mut visitor);
            if let Some(message) = visitor.message {
                self.0
                    .lock()
                    .unwrap()
                    .push((*event.metadata().level(), message));
            }
        }
    }
}
