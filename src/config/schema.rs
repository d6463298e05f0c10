//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the render
//! server. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Render behavior shared by all apps.
    pub render: RenderConfig,

    /// Applications served by this process. The first one is the default
    /// target for routes that name no app.
    pub apps: Vec<AppConfig>,

    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed to produce response headers, in seconds. Streaming
    /// bodies are not bounded by this.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RenderConfig {
    /// Load render modules per request through the dev loader and skip manifests.
    pub development: bool,

    /// Expose `GET /__routes` for route diagnostics.
    pub diagnostics: bool,
}

/// One client application.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AppConfig {
    /// Unique identifier routes refer to.
    pub id: String,

    /// Directory holding the built app (template, manifest).
    pub root: PathBuf,

    /// Template file, relative to `root`.
    #[serde(default = "default_template")]
    pub template: String,

    /// Build manifest, relative to `root`. Ignored in development mode.
    #[serde(default = "default_manifest")]
    pub manifest: String,

    /// Manifest key of the client bootstrap entry.
    #[serde(default = "default_client_entry")]
    pub client_entry: String,

    /// Public URL prefix for built assets.
    #[serde(default = "default_asset_base")]
    pub asset_base: String,
}

impl AppConfig {
    pub fn new(id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            root: root.into(),
            template: default_template(),
            manifest: default_manifest(),
            client_entry: default_client_entry(),
            asset_base: default_asset_base(),
        }
    }

    pub fn template_path(&self) -> PathBuf {
        self.root.join(&self.template)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(&self.manifest)
    }
}

fn default_template() -> String {
    "index.html".to_string()
}

fn default_manifest() -> String {
    "manifest.json".to_string()
}

fn default_client_entry() -> String {
    "entry-client.js".to_string()
}

fn default_asset_base() -> String {
    "/".to_string()
}

/// Content security policy settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Generate a nonce and emit the policy header.
    pub enabled: bool,

    /// Response header carrying the policy.
    pub header_name: String,

    /// Policy value; `{nonce}` is replaced by the per-request nonce.
    pub policy: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            header_name: "content-security-policy".to_string(),
            policy: "default-src 'self'; script-src 'self' 'nonce-{nonce}'; object-src 'none'; base-uri 'self'"
                .to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log filter; `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones.
    pub json_logs: bool,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Log events whose message contains any of these are dropped.
    pub suppressed_patterns: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
            suppressed_patterns: Vec::new(),
        }
    }
}
