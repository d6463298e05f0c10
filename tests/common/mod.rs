//! Shared utilities for integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;

use render_pipeline::config::{AppConfig, PipelineConfig};
use render_pipeline::data::ServiceDescriptor;
use render_pipeline::error::PipelineError;
use render_pipeline::http::HttpServer;
use render_pipeline::lifecycle::Shutdown;
use render_pipeline::render::{Deployment, EchoRenderModule, RenderModule, RenderPipeline};
use render_pipeline::routing::{BufferedAttributes, Params, Route, RouteTable};
use render_pipeline::services::{RequestContext, ServiceRegistry};
use render_pipeline::JsonMap;

pub const TEMPLATE: &str = "<!doctype html><html><head><meta charset=\"utf-8\"><!--ssr-head--></head><body><div id=\"root\"><!--ssr-html--></div></body></html>";

pub const MANIFEST: &str = r#"{
    "entry-client.js": { "file": "entry-4f2a.js", "css": ["entry-4f2a.css"], "imports": ["_shared"] },
    "_shared": { "file": "shared-91c.js" }
}"#;

/// Write a built app (template + manifest) into `dir`.
pub fn write_app(dir: &Path, id: &str, template: &str) -> AppConfig {
    std::fs::write(dir.join("index.html"), template).unwrap();
    std::fs::write(dir.join("manifest.json"), MANIFEST).unwrap();
    let mut app = AppConfig::new(id, dir);
    app.asset_base = "/assets/".into();
    app
}

pub fn users_registry() -> ServiceRegistry {
    ServiceRegistry::builder()
        .method("users", "get", |args: JsonMap, _c: RequestContext| async move {
            match args.get("id").and_then(Value::as_str) {
                Some("404") => Err(PipelineError::not_found("no such user")),
                Some(id) => Ok(json!({ "id": id, "name": "Ada" })),
                None => Err(PipelineError::bad_request("missing id")),
            }
        })
        .build()
}

pub fn user_route() -> Route {
    Route::new("/users/:id").buffered(BufferedAttributes::new().data(
        |p: Params, _c: RequestContext| async move {
            let mut args = JsonMap::new();
            args.insert("id".into(), Value::String(p["id"].clone()));
            Ok::<_, PipelineError>(ServiceDescriptor::new("users", "get").with_args(args).to_value())
        },
    ))
}

pub fn echo_modules(apps: &[AppConfig]) -> HashMap<String, Arc<dyn RenderModule>> {
    apps.iter()
        .map(|app| (app.id.clone(), Arc::new(EchoRenderModule) as Arc<dyn RenderModule>))
        .collect()
}

/// Pipeline over `config.apps` with the given routes and modules.
pub fn build_pipeline(
    config: &PipelineConfig,
    routes: Vec<Route>,
    registry: ServiceRegistry,
    modules: &HashMap<String, Arc<dyn RenderModule>>,
) -> Arc<RenderPipeline> {
    let deployment = Deployment::load(&config.apps, false, modules, None).unwrap();
    Arc::new(RenderPipeline::new(
        Arc::new(RouteTable::new(routes).unwrap()),
        Arc::new(registry),
        deployment,
    ))
}

/// Bind an ephemeral port and serve until the returned `Shutdown` triggers.
pub async fn start_server(server: HttpServer) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        server.run(listener, server_shutdown).await.unwrap();
    });
    (addr, shutdown)
}
