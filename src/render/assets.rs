//! Per-application assets: template, bootstrap module, link fragments and
//! the render module handle.
//!
//! # Responsibilities
//! - Read each app's template at startup (and on config reload)
//! - Outside development mode, read the build manifest to find the client
//!   bootstrap file plus its stylesheets and preloadable imports
//! - Hand the orchestrator a ready-to-use [`AppAssets`] per app id
//!
//! # Design Decisions
//! - The orchestrator only sees the [`AssetLookup`] trait
//! - A missing render module outside development mode fails the load, not
//!   the first request

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::{BoxError, PipelineError};
use crate::render::document::escape_html;
use crate::render::module::RenderModule;

/// Everything needed to render documents for one app.
#[derive(Clone)]
pub struct AppAssets {
    pub template: String,
    pub bootstrap_module: Option<String>,
    /// `<link rel="stylesheet">` tags, empty without a manifest.
    pub css_links: String,
    /// `<link rel="modulepreload">` tags, empty without a manifest.
    pub preload_links: String,
    pub manifest_loaded: bool,
    pub render_module: Option<Arc<dyn RenderModule>>,
}

impl AppAssets {
    /// Assets built from a template alone, as used in development mode.
    pub fn from_template(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            bootstrap_module: None,
            css_links: String::new(),
            preload_links: String::new(),
            manifest_loaded: false,
            render_module: None,
        }
    }

    pub fn with_render_module(mut self, module: Arc<dyn RenderModule>) -> Self {
        self.render_module = Some(module);
        self
    }

    pub fn with_bootstrap_module(mut self, path: impl Into<String>) -> Self {
        self.bootstrap_module = Some(path.into());
        self
    }

    /// Links appended to the document head. Only present with a manifest.
    pub fn head_links(&self) -> String {
        if self.manifest_loaded {
            format!("{}{}", self.preload_links, self.css_links)
        } else {
            String::new()
        }
    }
}

impl std::fmt::Debug for AppAssets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppAssets")
            .field("template_len", &self.template.len())
            .field("bootstrap_module", &self.bootstrap_module)
            .field("manifest_loaded", &self.manifest_loaded)
            .field("has_render_module", &self.render_module.is_some())
            .finish()
    }
}

/// Development-time module source.
///
/// Supplies a freshly loaded render module on every request so edits show
/// up without a restart.
#[async_trait]
pub trait DevModuleLoader: Send + Sync {
    async fn load_render_module(&self, app: &AppConfig) -> Result<Arc<dyn RenderModule>, BoxError>;

    /// Styles for `url`, inlined into the head.
    async fn collect_styles(&self, _app: &AppConfig, _url: &str) -> Result<String, BoxError> {
        Ok(String::new())
    }
}

/// Where the orchestrator looks up per-app assets.
pub trait AssetLookup: Send + Sync {
    fn assets(&self, app_id: &str) -> Option<Arc<AppAssets>>;

    fn dev_loader(&self) -> Option<Arc<dyn DevModuleLoader>> {
        None
    }
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    file: String,
    #[serde(default)]
    css: Vec<String>,
    #[serde(default)]
    imports: Vec<String>,
}

type Manifest = HashMap<String, ManifestEntry>;

/// In-memory asset table keyed by app id.
#[derive(Default)]
pub struct AssetRegistry {
    apps: HashMap<String, Arc<AppAssets>>,
    dev_loader: Option<Arc<dyn DevModuleLoader>>,
}

impl std::fmt::Debug for AssetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut apps: Vec<_> = self.apps.keys().collect();
        apps.sort();
        f.debug_struct("AssetRegistry")
            .field("apps", &apps)
            .field("has_dev_loader", &self.dev_loader.is_some())
            .finish()
    }
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, app_id: impl Into<String>, assets: AppAssets) {
        self.apps.insert(app_id.into(), Arc::new(assets));
    }

    pub fn with_dev_loader(mut self, loader: Arc<dyn DevModuleLoader>) -> Self {
        self.dev_loader = Some(loader);
        self
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    /// Load assets for every app from disk.
    ///
    /// `modules` maps app ids to their render module. Outside development
    /// mode each app must have one.
    pub fn load(
        apps: &[AppConfig],
        development: bool,
        modules: &HashMap<String, Arc<dyn RenderModule>>,
    ) -> Result<Self, PipelineError> {
        let mut registry = Self::new();
        for app in apps {
            let assets = load_app(app, development, modules.get(&app.id).cloned())?;
            tracing::info!(
                app = %app.id,
                manifest_loaded = assets.manifest_loaded,
                bootstrap = assets.bootstrap_module.as_deref().unwrap_or("-"),
                "App assets loaded"
            );
            registry.insert(app.id.clone(), assets);
        }
        Ok(registry)
    }
}

impl AssetLookup for AssetRegistry {
    fn assets(&self, app_id: &str) -> Option<Arc<AppAssets>> {
        self.apps.get(app_id).cloned()
    }

    fn dev_loader(&self) -> Option<Arc<dyn DevModuleLoader>> {
        self.dev_loader.clone()
    }
}

fn load_app(
    app: &AppConfig,
    development: bool,
    module: Option<Arc<dyn RenderModule>>,
) -> Result<AppAssets, PipelineError> {
    let template_path = app.template_path();
    let template = fs::read_to_string(&template_path).map_err(|e| {
        PipelineError::infra(format!("failed to read template for app '{}'", app.id))
            .with_details(serde_json::json!({ "path": template_path.display().to_string() }))
            .with_cause(e)
    })?;

    let mut assets = AppAssets::from_template(template);
    assets.render_module = module;

    if development {
        // The dev server serves sources directly.
        assets.bootstrap_module = Some(join_url(&app.asset_base, &app.client_entry));
        return Ok(assets);
    }

    if assets.render_module.is_none() {
        return Err(PipelineError::infra(format!(
            "no render module registered for app '{}'",
            app.id
        )));
    }

    let manifest_path = app.manifest_path();
    let manifest: Manifest = fs::read_to_string(&manifest_path)
        .map_err(BoxError::from)
        .and_then(|raw| serde_json::from_str(&raw).map_err(BoxError::from))
        .map_err(|e| {
            PipelineError::infra(format!("failed to load manifest for app '{}'", app.id))
                .with_details(serde_json::json!({ "path": manifest_path.display().to_string() }))
                .with_cause(e)
        })?;

    let entry = manifest.get(&app.client_entry).ok_or_else(|| {
        PipelineError::infra(format!(
            "manifest for app '{}' has no entry '{}'",
            app.id, app.client_entry
        ))
    })?;

    assets.bootstrap_module = Some(join_url(&app.asset_base, &entry.file));
    assets.preload_links = preload_links(&manifest, entry, &app.asset_base);
    assets.css_links = css_links(&manifest, entry, &app.asset_base);
    assets.manifest_loaded = true;
    Ok(assets)
}

fn join_url(base: &str, file: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), file.trim_start_matches('/'))
}

fn preload_links(manifest: &Manifest, entry: &ManifestEntry, base: &str) -> String {
    entry
        .imports
        .iter()
        .filter_map(|key| manifest.get(key))
        .map(|chunk| {
            format!(
                "<link rel=\"modulepreload\" href=\"{}\">",
                escape_html(&join_url(base, &chunk.file))
            )
        })
        .collect()
}

/// Stylesheets of the entry and its direct imports, deduplicated.
fn css_links(manifest: &Manifest, entry: &ManifestEntry, base: &str) -> String {
    let mut seen = BTreeSet::new();
    let imported = entry
        .imports
        .iter()
        .filter_map(|key| manifest.get(key))
        .flat_map(|chunk| chunk.css.iter());

    entry
        .css
        .iter()
        .chain(imported)
        .filter(|file| seen.insert(file.as_str()))
        .map(|file| {
            format!(
                "<link rel=\"stylesheet\" href=\"{}\">",
                escape_html(&join_url(base, file))
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::echo::EchoRenderModule;

    const TEMPLATE: &str = "<html><head><!--ssr-head--></head><body><!--ssr-html--></body></html>";

    fn write_app(dir: &std::path::Path, manifest: Option<&str>) -> AppConfig {
        fs::write(dir.join("index.html"), TEMPLATE).unwrap();
        if let Some(manifest) = manifest {
            fs::write(dir.join("manifest.json"), manifest).unwrap();
        }
        let mut app = AppConfig::new("web", dir);
        app.asset_base = "/assets/".into();
        app
    }

    fn echo_modules() -> HashMap<String, Arc<dyn RenderModule>> {
        let mut modules: HashMap<String, Arc<dyn RenderModule>> = HashMap::new();
        modules.insert("web".into(), Arc::new(EchoRenderModule));
        modules
    }

    #[test]
    fn test_manifest_drives_links() {
        let dir = tempfile::tempdir().unwrap();
        let app = write_app(
            dir.path(),
            Some(
                r#"{
                    "entry-client.js": { "file": "entry-abc.js", "css": ["main.css"], "imports": ["_vendor"] },
                    "_vendor": { "file": "vendor-123.js", "css": ["vendor.css", "main.css"] }
                }"#,
            ),
        );

        let registry = AssetRegistry::load(&[app], false, &echo_modules()).unwrap();
        let assets = registry.assets("web").unwrap();

        assert!(assets.manifest_loaded);
        assert_eq!(assets.template, TEMPLATE);
        assert_eq!(assets.bootstrap_module.as_deref(), Some("/assets/entry-abc.js"));
        assert_eq!(
            assets.preload_links,
            "<link rel=\"modulepreload\" href=\"/assets/vendor-123.js\">"
        );
        assert_eq!(
            assets.css_links,
            "<link rel=\"stylesheet\" href=\"/assets/main.css\">\
             <link rel=\"stylesheet\" href=\"/assets/vendor.css\">"
        );
        assert!(assets.head_links().starts_with("<link rel=\"modulepreload\""));
    }

    #[test]
    fn test_missing_render_module_fails_outside_development() {
        let dir = tempfile::tempdir().unwrap();
        let app = write_app(dir.path(), Some(r#"{"entry-client.js": {"file": "a.js"}}"#));
        let err = AssetRegistry::load(&[app], false, &HashMap::new()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Infra);
    }

    #[test]
    fn test_missing_manifest_entry_fails() {
        let dir = tempfile::tempdir().unwrap();
        let app = write_app(dir.path(), Some(r#"{"other.js": {"file": "a.js"}}"#));
        let err = AssetRegistry::load(&[app], false, &echo_modules()).unwrap_err();
        assert!(err.message().contains("has no entry 'entry-client.js'"));
    }

    #[test]
    fn test_development_skips_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let app = write_app(dir.path(), None);
        let registry = AssetRegistry::load(&[app], true, &HashMap::new()).unwrap();
        let assets = registry.assets("web").unwrap();

        assert!(!assets.manifest_loaded);
        assert!(assets.render_module.is_none());
        assert_eq!(assets.bootstrap_module.as_deref(), Some("/assets/entry-client.js"));
        assert_eq!(assets.head_links(), "");
    }

    #[test]
    fn test_missing_template_is_infra() {
        let dir = tempfile::tempdir().unwrap();
        let app = AppConfig::new("web", dir.path());
        let err = AssetRegistry::load(&[app], true, &HashMap::new()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Infra);
        assert!(err.details().is_some());
    }

    #[test]
    fn test_registry_debug_lists_apps() {
        let mut registry = AssetRegistry::new();
        registry.insert("web", AppAssets::from_template(TEMPLATE));
        registry.insert("admin", AppAssets::from_template(TEMPLATE));
        assert_eq!(
            format!("{registry:?}"),
            "AssetRegistry { apps: [\"admin\", \"web\"], has_dev_loader: false }"
        );
    }
}
