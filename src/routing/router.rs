//! Route lookup over an atomically swappable route table.
//!
//! # Responsibilities
//! - Store compiled matchers
//! - Look up the matching route for a request path
//! - Replace the whole matcher set on reload
//!
//! # Design Decisions
//! - Matchers are immutable after construction
//! - Reload builds a new set and swaps it in one step (`ArcSwap`);
//!   concurrent lookups see either the old or the new set, never a mix
//! - Explicit `None` rather than a silent default route

use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::error::PipelineError;
use crate::routing::matcher::{build_matchers, match_all, match_path, RouteMatch, RouteMatcher};
use crate::routing::route::Route;

#[derive(Debug)]
pub struct RouteTable {
    matchers: ArcSwap<Vec<RouteMatcher>>,
}

impl RouteTable {
    pub fn new(routes: impl IntoIterator<Item = Route>) -> Result<Self, PipelineError> {
        let matchers = build_matchers(routes)?;
        log_loaded(&matchers);
        Ok(Self {
            matchers: ArcSwap::from_pointee(matchers),
        })
    }

    /// Rebuild from a new route set. On error the current set stays active.
    pub fn reload(&self, routes: impl IntoIterator<Item = Route>) -> Result<(), PipelineError> {
        let matchers = build_matchers(routes)?;
        log_loaded(&matchers);
        self.matchers.store(Arc::new(matchers));
        Ok(())
    }

    pub fn match_path(&self, path: &str) -> Option<RouteMatch> {
        match_path(path, &self.matchers.load())
    }

    pub fn match_all(&self, path: &str) -> Vec<RouteMatch> {
        match_all(path, &self.matchers.load())
    }

    /// Current matcher set.
    pub fn snapshot(&self) -> Arc<Vec<RouteMatcher>> {
        self.matchers.load_full()
    }

    pub fn len(&self) -> usize {
        self.matchers.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn log_loaded(matchers: &[RouteMatcher]) {
    let summary: Vec<String> = matchers
        .iter()
        .take(10)
        .map(|m| format!("{} ({})", m.route().path, m.specificity()))
        .collect();
    tracing::info!(
        routes_count = matchers.len(),
        routes_summary = ?summary,
        "Routing table loaded"
    );
}
