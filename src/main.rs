//! `render-pipeline` server binary.
//!
//! Serves the configured apps with the built-in echo engine, which renders
//! each page's data snapshot. Real deployments embed the library and
//! register their own engine and routes.

use clap::Parser;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use render_pipeline::config::{load_config, ConfigWatcher, PipelineConfig};
use render_pipeline::data::ServiceDescriptor;
use render_pipeline::error::PipelineError;
use render_pipeline::http::{spawn_config_reload, HttpServer};
use render_pipeline::lifecycle::{wait_for_shutdown_signal, Shutdown};
use render_pipeline::observability::{logging, metrics};
use render_pipeline::render::{Deployment, EchoRenderModule, RenderModule, RenderPipeline};
use render_pipeline::routing::{BufferedAttributes, Params, Route, RouteTable, StreamingAttributes};
use render_pipeline::services::{RequestContext, ServiceRegistry};
use render_pipeline::JsonMap;

#[derive(Debug, Parser)]
#[command(name = "render-pipeline", version, about = "Server-side render pipeline")]
struct Cli {
    /// TOML configuration file. Watched for changes.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn meta(title: &str) -> JsonMap {
    let mut meta = JsonMap::new();
    meta.insert("title".into(), title.into());
    meta
}

fn builtin_routes() -> Vec<Route> {
    vec![
        Route::new("/").buffered(BufferedAttributes::new().meta(meta("Home")).data(
            |_p: Params, _c: RequestContext| async {
                Ok::<_, PipelineError>(ServiceDescriptor::new("system", "info").to_value())
            },
        )),
        Route::new("/echo/*").streaming(StreamingAttributes::new(meta("Echo")).data(
            |p: Params, c: RequestContext| async move {
                Ok::<_, PipelineError>(json!({ "params": p, "traceId": c.trace_id }))
            },
        )),
    ]
}

fn builtin_services() -> ServiceRegistry {
    ServiceRegistry::builder()
        .method("system", "info", |_args: JsonMap, _c: RequestContext| async {
            Ok::<_, PipelineError>(json!({
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }))
        })
        .build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => PipelineConfig::default(),
    };

    logging::init(&config.observability)?;
    tracing::info!("render-pipeline v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        apps = config.apps.len(),
        development = config.render.development,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    if config.render.development {
        tracing::warn!("Development mode needs a dev module loader; this binary has none");
    }

    let modules: HashMap<String, Arc<dyn RenderModule>> = config
        .apps
        .iter()
        .map(|app| (app.id.clone(), Arc::new(EchoRenderModule) as Arc<dyn RenderModule>))
        .collect();

    let deployment = Deployment::load(&config.apps, config.render.development, &modules, None)?;
    let pipeline = Arc::new(
        RenderPipeline::new(
            Arc::new(RouteTable::new(builtin_routes())?),
            Arc::new(builtin_services()),
            deployment,
        )
        .with_development(config.render.development),
    );

    let server = HttpServer::new(&config, Arc::clone(&pipeline))?;

    // Keep the watcher alive for the lifetime of the server.
    let _watcher = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path, &config);
            let watcher = watcher.run()?;
            spawn_config_reload(Arc::clone(&pipeline), updates, modules, None);
            Some(watcher)
        }
        None => None,
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let signals = shutdown.clone();
    tokio::spawn(async move { wait_for_shutdown_signal(&signals).await });

    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
