//! Render orchestration: one request in, one outcome out.
//!
//! # Data Flow
//! ```text
//! RenderRequest
//!     → asset-like path? → NotFound
//!     → RouteTable::match_path → none? → NotFound
//!     → app + assets for the route → missing? → infra error
//!     → CancellationSource (tripped if the request future is dropped)
//!     → Buffered: data → engine → whole document
//!       Streaming: headers now, engine on first body poll
//! ```
//!
//! # Design Decisions
//! - Apps and their assets are swapped together (`ArcSwap<Deployment>`),
//!   so a request never pairs one app's config with another's assets
//! - Benign render failures (client gone) end as `Abandoned`, never as errors
//! - Data-fetch errors keep their own status; only cancellation abandons them
//! - Errors that escape are `PipelineError`s carrying url and route details

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::{header, request::Parts, HeaderMap, StatusCode, Uri};
use axum::response::Response;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::config::AppConfig;
use crate::data::fetch_initial_data;
use crate::error::{ErrorKind, PipelineError};
use crate::lifecycle::{CancelReason, CancellationSource};
use crate::observability::metrics;
use crate::render::assets::{AppAssets, AssetLookup, AssetRegistry, DevModuleLoader};
use crate::render::document::{assemble_document, DocumentParts};
use crate::render::failure::{classify_failure, escalate, FailureClass};
use crate::render::module::{BufferedInput, DataInput, RenderError, RenderModule, StreamingInput};
use crate::render::streaming::{StreamSetup, StreamingBody};
use crate::render::template::TemplateFragments;
use crate::routing::{has_file_extension, Params, RenderMode, Route, RouteTable};
use crate::security::SecurityPolicy;
use crate::services::{resolve_trace_id, Identity, RequestContext, ServiceRegistry, TraceId};

/// What the HTTP layer needs from an incoming request.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub uri: Uri,
    pub headers: HeaderMap,
    pub trace_id: TraceId,
    pub security: Option<SecurityPolicy>,
    pub user: Option<Identity>,
}

impl RenderRequest {
    pub fn new(uri: Uri) -> Self {
        let headers = HeaderMap::new();
        Self {
            trace_id: resolve_trace_id(&headers),
            uri,
            headers,
            security: None,
            user: None,
        }
    }

    /// Build from request parts, picking up extensions set by middleware.
    pub fn from_parts(parts: &Parts) -> Self {
        let trace_id = parts
            .extensions
            .get::<TraceId>()
            .cloned()
            .unwrap_or_else(|| resolve_trace_id(&parts.headers));
        Self {
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            trace_id,
            security: parts.extensions.get::<SecurityPolicy>().cloned(),
            user: parts.extensions.get::<Identity>().cloned(),
        }
    }

    pub fn with_security(mut self, policy: SecurityPolicy) -> Self {
        self.security = Some(policy);
        self
    }

    /// Path plus query, as the engine should see it.
    pub fn url(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| self.uri.path())
    }
}

/// How a request ended.
#[derive(Debug)]
pub enum RenderOutcome {
    /// No route (or an asset-like path). The caller decides what 404 looks like.
    NotFound,
    Document(Response),
    /// Headers are final; the body renders as it is polled.
    Stream(Response),
    /// The client went away; nothing should be written.
    Abandoned,
}

impl RenderOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RenderOutcome::NotFound => "not_found",
            RenderOutcome::Document(_) => "completed",
            RenderOutcome::Stream(_) => "streaming",
            RenderOutcome::Abandoned => "abandoned",
        }
    }
}

/// Configured apps plus their loaded assets.
pub struct Deployment {
    apps: Vec<AppConfig>,
    assets: Box<dyn AssetLookup>,
}

impl Deployment {
    pub fn new(apps: Vec<AppConfig>, assets: impl AssetLookup + 'static) -> Self {
        Self {
            apps,
            assets: Box::new(assets),
        }
    }

    /// Load assets for `apps` from disk.
    pub fn load(
        apps: &[AppConfig],
        development: bool,
        modules: &HashMap<String, Arc<dyn RenderModule>>,
        dev_loader: Option<Arc<dyn DevModuleLoader>>,
    ) -> Result<Self, PipelineError> {
        let mut assets = AssetRegistry::load(apps, development, modules)?;
        if let Some(loader) = dev_loader {
            assets = assets.with_dev_loader(loader);
        }
        Ok(Self::new(apps.to_vec(), assets))
    }

    pub fn apps(&self) -> &[AppConfig] {
        &self.apps
    }

    /// The named app, or the first one when the route names none.
    pub fn app(&self, app_id: Option<&str>) -> Option<&AppConfig> {
        match app_id {
            Some(id) => self.apps.iter().find(|app| app.id == id),
            None => self.apps.first(),
        }
    }
}

struct RenderJob {
    url: String,
    route: Arc<Route>,
    params: Params,
    app: AppConfig,
    assets: Arc<AppAssets>,
    dev_loader: Option<Arc<dyn DevModuleLoader>>,
    source: CancellationSource,
    ctx: RequestContext,
    security: Option<SecurityPolicy>,
}

impl RenderJob {
    fn nonce(&self) -> Option<&str> {
        self.security.as_ref().map(|p| p.nonce.as_str())
    }
}

pub struct RenderPipeline {
    routes: Arc<RouteTable>,
    registry: Arc<ServiceRegistry>,
    deployment: ArcSwap<Deployment>,
    development: bool,
}

impl RenderPipeline {
    pub fn new(routes: Arc<RouteTable>, registry: Arc<ServiceRegistry>, deployment: Deployment) -> Self {
        Self {
            routes,
            registry,
            deployment: ArcSwap::from_pointee(deployment),
            development: false,
        }
    }

    /// Load render modules through the dev loader on every request.
    pub fn with_development(mut self, development: bool) -> Self {
        self.development = development;
        self
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn is_development(&self) -> bool {
        self.development
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Replace apps and assets in one step. In-flight renders keep the old set.
    pub fn swap_deployment(&self, deployment: Deployment) {
        tracing::info!(apps = deployment.apps.len(), "Deployment swapped");
        self.deployment.store(Arc::new(deployment));
    }

    pub async fn handle(&self, request: RenderRequest) -> Result<RenderOutcome, PipelineError> {
        let start = Instant::now();
        let url = request.url().to_string();

        if has_file_extension(request.uri.path()) {
            tracing::debug!(url = %url, "Asset-like path, not rendering");
            return Ok(RenderOutcome::NotFound);
        }

        let Some(matched) = self.routes.match_path(&url) else {
            tracing::debug!(url = %url, "No route matched");
            return Ok(RenderOutcome::NotFound);
        };
        let route = matched.route;
        let mode = route.render_mode();

        let deployment = self.deployment.load_full();
        let (app, assets) = match lookup_app(&deployment, &route) {
            Ok(found) => found,
            Err(err) => {
                let err = err.with_details(json!({
                    "url": url,
                    "route": route.path,
                    "appId": route.app_id,
                }));
                tracing::error!(
                    trace_id = %request.trace_id,
                    error = %err.to_log_value(),
                    "Render configuration missing"
                );
                metrics::record_render(mode, "failed", start);
                return Err(err);
            }
        };

        let source = CancellationSource::new();
        let mut client_guard = source.trip_on_drop(CancelReason::ClientAborted);
        let ctx = RequestContext::new(request.trace_id.as_str())
            .with_headers(&request.headers)
            .with_signal(source.signal())
            .with_user(request.user.clone());

        let job = RenderJob {
            url,
            route,
            params: matched.params,
            app: app.clone(),
            assets,
            dev_loader: deployment.assets.dev_loader(),
            source,
            ctx,
            security: request.security,
        };

        tracing::debug!(
            parent: &job.ctx.span,
            url = %job.url,
            route = %job.route.path,
            app = %job.app.id,
            mode = mode.as_str(),
            "Rendering"
        );

        let result = self.render(&job, mode).await;
        client_guard.disarm();

        let outcome = match &result {
            Ok(outcome) => outcome.label(),
            Err(_) => "failed",
        };
        metrics::record_render(mode, outcome, start);
        result
    }

    async fn render(&self, job: &RenderJob, mode: RenderMode) -> Result<RenderOutcome, PipelineError> {
        if job.source.is_tripped() {
            tracing::warn!(parent: &job.ctx.span, url = %job.url, "Client disconnected before render, skipping");
            return Ok(RenderOutcome::Abandoned);
        }

        let rendered = match mode {
            RenderMode::Buffered => self.buffered_document(job).await.map(RenderOutcome::Document),
            RenderMode::Streaming => self
                .streaming_response(job)
                .await
                .map(RenderOutcome::Stream)
                .map_err(Failure::Render),
        };

        match rendered {
            Ok(outcome) => Ok(outcome),
            // Fetch errors are the handler's own verdict; only cancellation abandons them.
            Err(Failure::Data(err)) => {
                if err.kind() == ErrorKind::Canceled || job.source.is_tripped() {
                    abandon(job, &err);
                    Ok(RenderOutcome::Abandoned)
                } else {
                    Err(fail(job, mode, Box::new(err)))
                }
            }
            Err(Failure::Render(err)) => match classify_failure(err.as_ref(), &job.source.signal()) {
                FailureClass::Benign => {
                    abandon(job, &err);
                    Ok(RenderOutcome::Abandoned)
                }
                FailureClass::Fatal => Err(fail(job, mode, err)),
            },
        }
    }

    async fn buffered_document(&self, job: &RenderJob) -> Result<Response, Failure> {
        let fragments = TemplateFragments::split(&job.assets.template).map_err(Failure::render)?;
        let data = fetch_initial_data(&job.route, &job.params, &self.registry, &job.ctx)
            .await
            .map_err(Failure::Data)?;
        let (module, dev_styles) = self.resolve_module(job).await.map_err(Failure::render)?;

        let rendered = module
            .render_buffered(BufferedInput {
                data: &data,
                url: &job.url,
                meta: job.route.meta(),
                signal: job.source.signal(),
            })
            .await
            .map_err(Failure::Render)?;

        let head_links = format!("{}{}", job.assets.head_links(), dev_styles);
        let html = assemble_document(
            &fragments,
            DocumentParts {
                rendered: &rendered,
                data: &data,
                head_links: &head_links,
                bootstrap_module: job.assets.bootstrap_module.as_deref(),
                hydrate: job.route.hydrate(),
                nonce: job.nonce(),
            },
        );

        html_response(Body::from(html), job.security.as_ref()).map_err(Failure::render)
    }

    async fn streaming_response(&self, job: &RenderJob) -> Result<Response, RenderError> {
        let fragments = TemplateFragments::split(&job.assets.template)?;
        let (module, dev_styles) = self.resolve_module(job).await?;

        // Headers first; the body only exists once they are known to be valid.
        let mut response = html_response(Body::empty(), job.security.as_ref())?;

        let data = {
            let route = Arc::clone(&job.route);
            let params = job.params.clone();
            let registry = Arc::clone(&self.registry);
            let ctx = job.ctx.clone();
            DataInput::new(async move { fetch_initial_data(&route, &params, &registry, &ctx).await })
        };
        let nonce = job.nonce().map(str::to_string);
        let input = StreamingInput {
            data,
            url: job.url.clone(),
            bootstrap_module: job
                .assets
                .bootstrap_module
                .clone()
                .filter(|_| job.route.hydrate()),
            meta: job.route.meta().cloned().unwrap_or_default(),
            nonce: nonce.clone(),
            signal: job.source.signal(),
        };

        let body = StreamingBody::new(StreamSetup {
            module,
            input,
            fragments,
            head_links: format!("{}{}", job.assets.head_links(), dev_styles),
            nonce,
            source: job.source.clone(),
            span: job.ctx.span.clone(),
            url: job.url.clone(),
            route: job.route.path.clone(),
        });
        *response.body_mut() = Body::from_stream(body.into_stream());
        Ok(response)
    }

    /// Render module plus any development-only head styles.
    async fn resolve_module(
        &self,
        job: &RenderJob,
    ) -> Result<(Arc<dyn RenderModule>, String), PipelineError> {
        if !self.development {
            let module = job.assets.render_module.clone().ok_or_else(|| {
                PipelineError::infra(format!("no render module for app '{}'", job.app.id))
            })?;
            return Ok((module, String::new()));
        }

        let loader = job.dev_loader.as_ref().ok_or_else(|| {
            PipelineError::infra("development mode requires a dev module loader")
        })?;
        let module = loader.load_render_module(&job.app).await.map_err(|e| {
            PipelineError::infra(format!("failed to load render module for app '{}'", job.app.id))
                .with_cause(e)
        })?;
        let styles = loader.collect_styles(&job.app, &job.url).await.map_err(|e| {
            PipelineError::infra(format!("failed to collect styles for app '{}'", job.app.id))
                .with_cause(e)
        })?;
        Ok((module, styles))
    }
}

/// Where a buffered render stopped.
enum Failure {
    /// The route's data handler or the service it named.
    Data(PipelineError),
    /// Template, engine or response construction.
    Render(RenderError),
}

impl Failure {
    fn render(err: impl Into<RenderError>) -> Self {
        Failure::Render(err.into())
    }
}

fn abandon(job: &RenderJob, err: &dyn std::fmt::Display) {
    tracing::warn!(
        parent: &job.ctx.span,
        url = %job.url,
        route = %job.route.path,
        error = %err,
        "Render abandoned, client disconnected"
    );
}

fn fail(job: &RenderJob, mode: RenderMode, err: RenderError) -> PipelineError {
    let err = escalate(err, &job.url, &job.route.path);
    tracing::error!(
        parent: &job.ctx.span,
        url = %job.url,
        route = %job.route.path,
        mode = mode.as_str(),
        error = %err.to_log_value(),
        "Render failed"
    );
    err
}

fn lookup_app<'a>(
    deployment: &'a Deployment,
    route: &Route,
) -> Result<(&'a AppConfig, Arc<AppAssets>), PipelineError> {
    let app = deployment
        .app(route.app_id.as_deref())
        .ok_or_else(|| PipelineError::infra("no app configured for route"))?;
    let assets = deployment
        .assets
        .assets(&app.id)
        .ok_or_else(|| PipelineError::infra(format!("no assets loaded for app '{}'", app.id)))?;
    Ok((app, assets))
}

fn html_response(body: Body, security: Option<&SecurityPolicy>) -> Result<Response, axum::http::Error> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8");
    if let Some(policy) = security {
        builder = builder.header(policy.header_name.clone(), policy.header_value.clone());
    }
    builder.body(body)
}
