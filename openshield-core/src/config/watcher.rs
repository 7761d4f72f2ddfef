//! Hot reload of the configuration file
//!
//! The parent directory is watched rather than the file itself, so editors that
//! save through rename-and-replace keep triggering reloads.

use super::error::ConfigError;
use super::schema::GatewayConfig;
use notify::{recommended_watcher, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Keeps the file watch alive; dropping it stops reloads
pub struct ConfigWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for ConfigWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigWatcher").field("path", &self.path).finish()
    }
}

/// Re-run the full load pipeline whenever `path` changes
///
/// `on_change` receives every configuration that loads and validates. A file
/// that fails is logged and skipped, so the previous configuration stays live.
pub fn watch_file<F>(path: impl AsRef<Path>, on_change: F) -> Result<ConfigWatcher, ConfigError>
where
    F: Fn(GatewayConfig) + Send + 'static,
{
    let path = path.as_ref().to_path_buf();
    let watch_error = |message: String| ConfigError::Watch {
        path: path.display().to_string(),
        message,
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .ok_or_else(|| watch_error("path has no file name".to_string()))?;
    let directory = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let target = path.clone();
    let mut watcher = recommended_watcher(move |result: notify::Result<Event>| {
        let event = match result {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Config watcher error");
                return;
            }
        };

        if !(event.kind.is_modify() || event.kind.is_create()) {
            return;
        }
        if !event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
        {
            return;
        }

        debug!(path = %target.display(), kind = ?event.kind, "Config file changed");
        match super::load_from_yaml(&target) {
            Ok(config) => {
                info!(path = %target.display(), "Configuration reloaded");
                on_change(config);
            }
            Err(e) => warn!(path = %target.display(), error = %e, "Ignoring invalid configuration"),
        }
    })
    .map_err(|e| watch_error(e.to_string()))?;

    watcher
        .watch(&directory, RecursiveMode::NonRecursive)
        .map_err(|e| watch_error(e.to_string()))?;

    Ok(ConfigWatcher {
        path,
        _watcher: watcher,
    })
}
