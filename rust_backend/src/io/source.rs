use chrono::{DateTime, Local, NaiveDateTime, Timelike};
use log::{debug, info, warn};
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{ConfigStore, MODIFICATION_DATE_FORMAT};

/// Identity of a loaded source: the file and its modification time (seconds).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceIdentity {
    pub path: PathBuf,
    pub modified: NaiveDateTime,
}

impl SourceIdentity {
    /// Modification time in the persisted `modification_date` layout.
    pub fn modified_label(&self) -> String {
        self.modified.format(MODIFICATION_DATE_FORMAT).to_string()
    }
}

fn is_workbook_name(name: &str) -> bool {
    (name.ends_with(".xlsx") || name.ends_with(".xls")) && !name.starts_with("~$")
}

/// Locates the active workbook and exposes its modification time.
///
/// The remembered path lives in the user config (`path_to_excel`). When it is
/// missing or gone, the configured directory is scanned and the
/// lexicographically first workbook wins. Office lock files (`~$...`) are skipped.
pub struct WorkbookSource {
    config: Arc<ConfigStore>,
    dir_path: PathBuf,
    cached: RwLock<Option<PathBuf>>,
}

impl WorkbookSource {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        let dir_path = PathBuf::from(&config.base().dir_path);
        let remembered = config.user().path_to_excel;
        let cached = (!remembered.trim().is_empty()).then(|| PathBuf::from(remembered));
        Self {
            config,
            dir_path,
            cached: RwLock::new(cached),
        }
    }

    pub fn dir_path(&self) -> &Path {
        &self.dir_path
    }

    pub fn cached_path(&self) -> Option<PathBuf> {
        self.cached.read().clone()
    }

    fn remember(&self, path: Option<PathBuf>) {
        let label = path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        *self.cached.write() = path;
        if let Err(e) = self.config.update_user(|cfg| cfg.path_to_excel = label) {
            warn!("Could not persist workbook path: {}", e);
        }
    }

    /// Forget the remembered path (in memory and in the user config).
    pub fn clear_cached_path(&self) {
        debug!("Clearing cached workbook path");
        self.remember(None);
    }

    /// Path of the workbook to load, if any.
    pub fn resolve_active_path(&self) -> Option<PathBuf> {
        if let Some(cached) = self.cached_path() {
            if cached.exists() {
                debug!("Using cached workbook path: {}", cached.display());
                return Some(cached);
            }
            debug!("Cached workbook path doesn't exist: {}", cached.display());
            self.clear_cached_path();
        }

        let found = self.scan_directory()?;
        info!("Selected workbook: {}", found.display());
        self.remember(Some(found.clone()));
        Some(found)
    }

    fn scan_directory(&self) -> Option<PathBuf> {
        if self.dir_path.as_os_str().is_empty() {
            debug!("No workbook directory configured");
            return None;
        }
        info!("Scanning directory: {}", self.dir_path.display());

        if let Err(e) = fs::create_dir_all(&self.dir_path) {
            warn!("Cannot create {}: {}", self.dir_path.display(), e);
            return None;
        }
        let entries = match fs::read_dir(&self.dir_path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Error reading directory {}: {}", self.dir_path.display(), e);
                return None;
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| is_workbook_name(name))
            .collect();
        names.sort();

        match names.first() {
            Some(first) => Some(self.dir_path.join(first)),
            None => {
                warn!("No workbook found in {}", self.dir_path.display());
                None
            }
        }
    }

    /// Modification time of `path`, truncated to whole seconds in local time.
    pub fn mtime(&self, path: &Path) -> Option<NaiveDateTime> {
        let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
        let local: DateTime<Local> = modified.into();
        local.naive_local().with_nanosecond(0)
    }

    /// Identity of the currently active workbook.
    pub fn identity(&self) -> Option<SourceIdentity> {
        let path = self.resolve_active_path()?;
        let modified = self.mtime(&path)?;
        Some(SourceIdentity { path, modified })
    }

    /// Select a workbook explicitly, rejecting paths that are not readable files.
    pub fn set_path(&self, path: &Path) -> Result<(), String> {
        if path.as_os_str().is_empty() {
            return Err("Path cannot be empty.".to_string());
        }
        if !path.exists() {
            return Err("The excel file doesn't exist.".to_string());
        }
        if !path.is_file() {
            return Err(
                "The path is not a file; make sure it points to an .xlsx or .xls workbook."
                    .to_string(),
            );
        }
        info!("Workbook selected manually: {}", path.display());
        self.remember(Some(path.to_path_buf()));
        Ok(())
    }
}
