//! End-to-end rendering, over a real socket and in-process through the router.

use axum::body::{to_bytes, Body};
use axum::http::Request;
use reqwest::StatusCode;
use tower::ServiceExt;
use serde_json::{json, Value};

use render_pipeline::config::PipelineConfig;
use render_pipeline::error::PipelineError;
use render_pipeline::http::HttpServer;
use render_pipeline::routing::{Params, Route, StreamingAttributes};
use render_pipeline::services::RequestContext;
use render_pipeline::JsonMap;

mod common;

fn config_for(dir: &std::path::Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.render.diagnostics = true;
    config.apps = vec![common::write_app(dir, "web", common::TEMPLATE)];
    config
}

fn live_route() -> Route {
    let mut meta = JsonMap::new();
    meta.insert("title".into(), "Live".into());
    Route::new("/live/:id").streaming(StreamingAttributes::new(meta).data(
        |p: Params, _c: RequestContext| async move {
            Ok::<_, PipelineError>(json!({ "id": p["id"] }))
        },
    ))
}

async fn start(dir: &std::path::Path) -> (String, render_pipeline::Shutdown) {
    let config = config_for(dir);
    let modules = common::echo_modules(&config.apps);
    let pipeline = common::build_pipeline(
        &config,
        vec![common::user_route(), live_route()],
        common::users_registry(),
        &modules,
    );
    let server = HttpServer::new(&config, pipeline).unwrap();
    let (addr, shutdown) = common::start_server(server).await;
    (format!("http://{addr}"), shutdown)
}

#[tokio::test]
async fn test_buffered_user_page_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let (base, shutdown) = start(dir.path()).await;

    let res = reqwest::get(format!("{base}/users/42")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "text/html; charset=utf-8");
    assert!(res.headers().contains_key("x-request-id"));
    assert!(res.headers().contains_key("x-trace-id"));

    let csp = res.headers()["content-security-policy"].to_str().unwrap().to_string();
    let nonce = csp
        .split("'nonce-")
        .nth(1)
        .and_then(|rest| rest.split('\'').next())
        .unwrap()
        .to_string();

    let html = res.text().await.unwrap();
    assert!(html.contains("<link rel=\"modulepreload\" href=\"/assets/shared-91c.js\">"));
    assert!(html.contains("<link rel=\"stylesheet\" href=\"/assets/entry-4f2a.css\"></head>"));
    assert!(html.contains(&format!(
        "<script nonce=\"{nonce}\">window.__INITIAL_DATA__ = {{\"id\":\"42\",\"name\":\"Ada\"}};</script>"
    )));
    assert!(html.contains(&format!(
        "<script nonce=\"{nonce}\" type=\"module\" src=\"/assets/entry-4f2a.js\" defer></script>"
    )));

    shutdown.trigger();
}

#[tokio::test]
async fn test_inbound_trace_id_is_echoed_in_errors() {
    let dir = tempfile::tempdir().unwrap();
    let (base, shutdown) = start(dir.path()).await;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{base}/users/404"))
        .header("x-trace-id", "checkout-123")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.headers()["x-trace-id"], "checkout-123");

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "no such user");
    assert_eq!(body["kind"], "domain");
    assert_eq!(body["traceId"], "checkout-123");

    shutdown.trigger();
}

#[tokio::test]
async fn test_unmatched_and_asset_paths_are_plain_404() {
    let dir = tempfile::tempdir().unwrap();
    let (base, shutdown) = start(dir.path()).await;

    for path in ["/nope", "/assets/entry-4f2a.js", "/users/1/favicon.ico"] {
        let res = reqwest::get(format!("{base}{path}")).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "{path}");
        assert_eq!(res.text().await.unwrap(), "Not Found");
    }

    let res = reqwest::Client::new()
        .post(format!("{base}/users/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);

    shutdown.trigger();
}

#[tokio::test]
async fn test_streaming_page_arrives_in_document_order() {
    let dir = tempfile::tempdir().unwrap();
    let (base, shutdown) = start(dir.path()).await;

    let res = reqwest::get(format!("{base}/live/7")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("content-security-policy"));

    let html = res.text().await.unwrap();
    let head = html.find("<title>Live</title>").unwrap();
    let body = html.find("<pre id=\"initial-data\">").unwrap();
    let data = html.find("window.__INITIAL_DATA__ = {\"id\":\"7\"}").unwrap();
    let ready = html.find("new Event('initial-data-ready')").unwrap();
    let tail = html.find("</body></html>").unwrap();
    assert!(head < body && body < data && data < ready && ready < tail);
    assert_eq!(html.matches("__INITIAL_DATA__").count(), 1);

    shutdown.trigger();
}

#[tokio::test]
async fn test_route_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let (base, shutdown) = start(dir.path()).await;

    let body: Value = reqwest::get(format!("{base}/__routes?path=/users/42"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["path"], "/users/42");
    assert_eq!(body["matches"][0]["pattern"], "/users/:id");
    assert_eq!(body["matches"][0]["mode"], "buffered");
    assert_eq!(body["matches"][0]["params"]["id"], "42");

    let all: Value = reqwest::get(format!("{base}/__routes"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all["matches"].as_array().unwrap().len(), 2);

    shutdown.trigger();
}


async fn oneshot(server: &HttpServer, uri: &str) -> (StatusCode, axum::http::HeaderMap, String) {
    let response = server
        .router()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_disabled_security_renders_without_nonce() {
    let dir = tempfile::tempdir().unwrap();
    let config = {
        let mut config = config_for(dir.path());
        config.security.enabled = false;
        config
    };
    let modules = common::echo_modules(&config.apps);
    let pipeline = common::build_pipeline(
        &config,
        vec![common::user_route()],
        common::users_registry(),
        &modules,
    );
    let server = HttpServer::new(&config, pipeline).unwrap();

    let (status, headers, html) = oneshot(&server, "/users/7").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!headers.contains_key("content-security-policy"));
    assert!(html.contains("<script>window.__INITIAL_DATA__ = {\"id\":\"7\",\"name\":\"Ada\"};</script>"));
    assert!(!html.contains("nonce="));
}

#[tokio::test]
async fn test_diagnostics_route_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let config = {
        let mut config = config_for(dir.path());
        config.render.diagnostics = false;
        config
    };
    let modules = common::echo_modules(&config.apps);
    let pipeline = common::build_pipeline(
        &config,
        vec![common::user_route()],
        common::users_registry(),
        &modules,
    );
    let server = HttpServer::new(&config, pipeline).unwrap();

    // Falls through to the renderer, which has no route for it.
    let (status, _, body) = oneshot(&server, "/__routes").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "Not Found");
}
