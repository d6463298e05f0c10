//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the render fallback and diagnostics handlers
//! - Wire up middleware (request id, tracing, timeout, trace id, security)
//! - Bind server to listener and shut down gracefully
//! - Apply reloaded configuration to the running pipeline

use axum::{
    body::Body,
    extract::{Query, State},
    http::{Method, Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::PipelineConfig;
use crate::http::request::trace_id_middleware;
use crate::http::response::error_response;
use crate::lifecycle::Shutdown;
use crate::routing::Params;
use crate::render::{Deployment, DevModuleLoader, RenderModule, RenderPipeline, RenderRequest};
use crate::security::{security_headers_middleware, PolicyError, PolicyTemplate};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RenderPipeline>,
}

/// HTTP server for the render pipeline.
pub struct HttpServer {
    router: Router,
    pipeline: Arc<RenderPipeline>,
}

impl HttpServer {
    pub fn new(config: &PipelineConfig, pipeline: Arc<RenderPipeline>) -> Result<Self, PolicyError> {
        let policy = PolicyTemplate::from_config(&config.security)?.map(Arc::new);
        let state = AppState {
            pipeline: Arc::clone(&pipeline),
        };
        let router = Self::build_router(config, state, policy);
        Ok(Self { router, pipeline })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &PipelineConfig,
        state: AppState,
        policy: Option<Arc<PolicyTemplate>>,
    ) -> Router {
        let mut router = Router::new();
        if config.render.diagnostics {
            router = router.route("/__routes", get(routes_handler));
        }
        let mut router = router.fallback(render_handler).with_state(state);

        if let Some(policy) = policy {
            router = router.layer(middleware::from_fn_with_state(
                policy,
                security_headers_middleware,
            ));
        }

        router
            .layer(middleware::from_fn(trace_id_middleware))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn pipeline(&self) -> &Arc<RenderPipeline> {
        &self.pipeline
    }

    /// Serve on `listener` until `shutdown` triggers, then drain.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, routes = self.pipeline.routes().len(), "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Render any path the router does not claim.
async fn render_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (parts, _body) = request.into_parts();
    if parts.method != Method::GET && parts.method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let render_request = RenderRequest::from_parts(&parts);
    let trace_id = render_request.trace_id.clone();

    match state.pipeline.handle(render_request).await {
        Ok(outcome) => outcome.into_response(),
        Err(err) => error_response(&err, Some(trace_id.as_str())),
    }
}

#[derive(Debug, Deserialize)]
struct RoutesQuery {
    path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RouteReport {
    pattern: String,
    app_id: Option<String>,
    mode: &'static str,
    specificity: Option<u32>,
    params: Params,
}

/// Route diagnostics: every route matching `?path=`, most specific first.
/// Without a path, lists the whole table.
async fn routes_handler(
    State(state): State<AppState>,
    Query(query): Query<RoutesQuery>,
) -> Json<serde_json::Value> {
    let routes = state.pipeline.routes();
    let snapshot = routes.snapshot();
    let specificity_of = |pattern: &str| {
        snapshot
            .iter()
            .find(|m| m.route().path == pattern)
            .map(|m| m.specificity())
    };

    let reports: Vec<RouteReport> = match query.path.as_deref() {
        Some(path) => routes
            .match_all(path)
            .into_iter()
            .map(|m| RouteReport {
                specificity: specificity_of(&m.route.path),
                pattern: m.route.path.clone(),
                app_id: m.route.app_id.clone(),
                mode: m.route.render_mode().as_str(),
                params: m.params,
            })
            .collect(),
        None => snapshot
            .iter()
            .map(|m| RouteReport {
                pattern: m.route().path.clone(),
                app_id: m.route().app_id.clone(),
                mode: m.route().render_mode().as_str(),
                specificity: Some(m.specificity()),
                params: Params::new(),
            })
            .collect(),
    };

    Json(serde_json::json!({
        "path": query.path,
        "matches": reports,
    }))
}

/// Apply validated configs from the watcher: reload assets and swap them in.
///
/// A config whose assets fail to load is rejected and the current
/// deployment stays active.
pub fn spawn_config_reload(
    pipeline: Arc<RenderPipeline>,
    mut updates: mpsc::UnboundedReceiver<PipelineConfig>,
    modules: HashMap<String, Arc<dyn RenderModule>>,
    dev_loader: Option<Arc<dyn DevModuleLoader>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(config) = updates.recv().await {
            if config.render.development != pipeline.is_development() {
                tracing::warn!("render.development changed; restart to apply it");
            }
            match Deployment::load(
                &config.apps,
                pipeline.is_development(),
                &modules,
                dev_loader.clone(),
            ) {
                Ok(deployment) => pipeline.swap_deployment(deployment),
                Err(e) => tracing::error!(
                    error = %e.to_log_value(),
                    "Reloaded config rejected, keeping current deployment"
                ),
            }
        }
    })
}
