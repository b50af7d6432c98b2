//! Subscriber setup for the binary.
//!
//! The library logs through `log`; the fmt subscriber installed here picks
//! those records up and honours `RUST_LOG` (default `info`).

use chrono::Local;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::config::LogSettings;
use crate::core::{DashboardError, DashboardResult};

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M";

/// Expand the `{ts}` placeholder of a log file template.
pub fn resolve_log_path(template: &str, now: chrono::NaiveDateTime) -> PathBuf {
    PathBuf::from(template.replace("{ts}", &now.format(TIMESTAMP_FORMAT).to_string()))
}

/// Install the global subscriber. Returns the log file, if any.
pub fn init(settings: &LogSettings) -> DashboardResult<Option<PathBuf>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);

    let template = settings
        .log_file_desktop_app
        .as_deref()
        .filter(|template| !template.trim().is_empty());

    let Some(template) = template else {
        builder
            .try_init()
            .map_err(|e| DashboardError::InternalError(format!("Failed to init logging: {}", e)))?;
        return Ok(None);
    };

    let path = resolve_log_path(template, Local::now().naive_local());
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            DashboardError::ConfigMissing(format!("log directory {}: {}", parent.display(), e))
        })?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| DashboardError::ConfigMissing(format!("log file {}: {}", path.display(), e)))?;

    builder
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| DashboardError::InternalError(format!("Failed to init logging: {}", e)))?;
    Ok(Some(path))
}
