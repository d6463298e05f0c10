//! Hot reload of the config file and the app build outputs it points at.
//!
//! A rebuild of an app rewrites its template and manifest without touching
//! the config file, so those are watched too. Any relevant change reloads the
//! config from disk and pushes the validated result downstream.

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::PipelineConfig;

pub struct ConfigWatcher {
    config_path: PathBuf,
    /// Files whose change triggers a reload.
    watched_files: BTreeSet<PathBuf>,
    update_tx: mpsc::UnboundedSender<PipelineConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for validated configuration updates.
    pub fn new(
        config_path: &Path,
        current: &PipelineConfig,
    ) -> (Self, mpsc::UnboundedReceiver<PipelineConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            config_path: config_path.to_path_buf(),
            watched_files: watched_files(config_path, current),
            update_tx,
        };
        (watcher, update_rx)
    }

    pub fn watched_files(&self) -> &BTreeSet<PathBuf> {
        &self.watched_files
    }

    /// Start watching. Keep the returned watcher alive.
    ///
    /// Directories are watched rather than files so that editors and bundlers
    /// replacing a file (write to temp, rename) are still seen.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self {
            config_path,
            watched_files,
            update_tx,
        } = self;

        let dirs: BTreeSet<PathBuf> = watched_files
            .iter()
            .filter_map(|f| f.parent().map(Path::to_path_buf))
            .collect();

        let handler_files = watched_files.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if is_relevant(&event, &handler_files) => {
                    tracing::info!(paths = ?event.paths, "Watched file changed, reloading config");
                    match load_config(&config_path) {
                        Ok(config) => {
                            let _ = update_tx.send(config);
                        }
                        Err(e) => tracing::error!(
                            error = %e,
                            "Failed to reload config. Keeping current configuration."
                        ),
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        for dir in &dirs {
            if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
                tracing::warn!(dir = %dir.display(), error = %e, "Cannot watch directory");
            }
        }

        tracing::info!(files = watched_files.len(), dirs = dirs.len(), "Config watcher started");
        Ok(watcher)
    }
}

/// Absolute paths, matching what the OS reports for watched directories.
fn watched_files(config_path: &Path, config: &PipelineConfig) -> BTreeSet<PathBuf> {
    let absolute = |p: PathBuf| std::path::absolute(&p).unwrap_or(p);
    let mut files = BTreeSet::new();
    files.insert(absolute(config_path.to_path_buf()));
    for app in &config.apps {
        files.insert(absolute(app.template_path()));
        files.insert(absolute(app.manifest_path()));
    }
    files
}

fn is_relevant(event: &Event, watched: &BTreeSet<PathBuf>) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event.paths.iter().any(|p| watched.contains(p))
}
