//! Configuration file support.
//!
//! Two TOML documents drive the dashboard: a bundled base document (`config.toml`)
//! holding deployment settings, and a per-user document in the OS config
//! directory that remembers the selected workbook and its last observed
//! modification time. Missing documents are created empty and defaults apply.

use log::{debug, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::{DashboardError, DashboardResult};

/// Timestamp layout used for `modification_date`.
pub const MODIFICATION_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Base configuration bundled with the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaseConfig {
    /// Directory scanned for workbooks when no path is remembered
    #[serde(default)]
    pub dir_path: String,
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub config: ConfigFileSettings,
    #[serde(default)]
    pub redis: Option<RedisSettings>,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub watcher: WatcherSettings,
    #[serde(default)]
    pub log: LogSettings,
    /// Per-page visibility flags for the navigation layer
    #[serde(default)]
    pub pages: BTreeMap<String, bool>,
}

/// Naming used to resolve the user config directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_auth")]
    pub auth: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFileSettings {
    #[serde(default = "default_config_data_name")]
    pub config_data_name: String,
}

/// Key/value store endpoint for the computation cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisSettings {
    #[serde(default = "default_redis_host")]
    pub host: String,
    #[serde(default = "default_redis_port")]
    pub port: u16,
    #[serde(default)]
    pub db: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherSettings {
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogSettings {
    /// Log file template; `{ts}` is replaced by the start timestamp
    #[serde(default)]
    pub log_file_desktop_app: Option<String>,
}

/// Per-user state persisted between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub path_to_excel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification_date: Option<String>,
    #[serde(default = "default_auto_refresh")]
    pub auto_refresh: bool,
    /// Keys written by other tools are carried through untouched
    #[serde(flatten)]
    pub extra: toml::Table,
}

fn default_app_name() -> String {
    "DashBoardRam".to_string()
}

fn default_auth() -> String {
    "StagePFA".to_string()
}

fn default_config_data_name() -> String {
    "config_data.toml".to_string()
}

fn default_redis_host() -> String {
    "localhost".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_ttl_seconds() -> u64 {
    3600
}

fn default_reconnect_interval() -> u64 {
    10
}

fn default_tick_millis() -> u64 {
    1000
}

fn default_auto_refresh() -> bool {
    true
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            auth: default_auth(),
        }
    }
}

impl Default for ConfigFileSettings {
    fn default() -> Self {
        Self {
            config_data_name: default_config_data_name(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
            reconnect_interval_seconds: default_reconnect_interval(),
        }
    }
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            tick_millis: default_tick_millis(),
        }
    }
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            path_to_excel: String::new(),
            modification_date: None,
            auto_refresh: default_auto_refresh(),
            extra: toml::Table::new(),
        }
    }
}

impl RedisSettings {
    pub fn url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

impl BaseConfig {
    /// Parse a base configuration document.
    pub fn from_toml_str(content: &str) -> DashboardResult<Self> {
        toml::from_str(content).map_err(|e| {
            DashboardError::InternalError(format!("Failed to parse config file: {}", e))
        })
    }

    /// Whether a page is enabled; pages not listed are visible.
    pub fn page_enabled(&self, name: &str) -> bool {
        self.pages.get(name).copied().unwrap_or(true)
    }
}

/// Read a TOML document, creating an empty one when it does not exist.
fn read_or_create(path: &Path) -> DashboardResult<String> {
    if path.exists() {
        return fs::read_to_string(path).map_err(|e| {
            DashboardError::InternalError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        });
    }

    let missing = DashboardError::ConfigMissing(path.display().to_string());
    warn!("{}; creating it with defaults", missing);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            DashboardError::InternalError(format!(
                "Failed to create config directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }
    fs::write(path, "").map_err(|e| {
        DashboardError::InternalError(format!(
            "Failed to create config file {}: {}",
            path.display(),
            e
        ))
    })?;
    Ok(String::new())
}

/// OS-appropriate directory holding the user document.
pub fn user_config_dir(app: &AppSettings) -> PathBuf {
    let root = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    if cfg!(windows) {
        root.join(&app.auth).join(&app.app_name)
    } else {
        root.join(&app.app_name)
    }
}

/// Base and user configuration, with write-back for the user document.
#[derive(Debug)]
pub struct ConfigStore {
    base: BaseConfig,
    base_path: PathBuf,
    user_path: PathBuf,
    user: RwLock<UserConfig>,
}

impl ConfigStore {
    /// Load the base document and the user document from the OS config directory.
    pub fn load<P: AsRef<Path>>(base_path: P) -> DashboardResult<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        let base = BaseConfig::from_toml_str(&read_or_create(&base_path)?)?;
        let user_dir = user_config_dir(&base.app);
        Self::open(base_path, base, &user_dir)
    }

    /// Load the base document, keeping the user document under `user_dir`.
    pub fn load_with_user_dir<P: AsRef<Path>, Q: AsRef<Path>>(
        base_path: P,
        user_dir: Q,
    ) -> DashboardResult<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        let base = BaseConfig::from_toml_str(&read_or_create(&base_path)?)?;
        Self::open(base_path, base, user_dir.as_ref())
    }

    fn open(base_path: PathBuf, base: BaseConfig, user_dir: &Path) -> DashboardResult<Self> {
        let user_path = user_dir.join(&base.config.config_data_name);
        info!("Loading user config from: {}", user_path.display());
        let content = read_or_create(&user_path)?;
        let user: UserConfig = toml::from_str(&content).map_err(|e| {
            DashboardError::InternalError(format!("Failed to parse user config: {}", e))
        })?;

        Ok(Self {
            base,
            base_path,
            user_path,
            user: RwLock::new(user),
        })
    }

    pub fn base(&self) -> &BaseConfig {
        &self.base
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn user_path(&self) -> &Path {
        &self.user_path
    }

    /// Snapshot of the user document.
    pub fn user(&self) -> UserConfig {
        self.user.read().clone()
    }

    /// Apply `patch` to the user document and write it back.
    ///
    /// The in-memory copy only changes when the write succeeds.
    pub fn update_user<F>(&self, patch: F) -> DashboardResult<UserConfig>
    where
        F: FnOnce(&mut UserConfig),
    {
        let mut guard = self.user.write();
        let mut updated = guard.clone();
        patch(&mut updated);

        let content = toml::to_string_pretty(&updated).map_err(|e| {
            DashboardError::InternalError(format!("Failed to serialize user config: {}", e))
        })?;
        fs::write(&self.user_path, content).map_err(|e| {
            DashboardError::InternalError(format!(
                "Failed to write user config {}: {}",
                self.user_path.display(),
                e
            ))
        })?;
        debug!("Saved user config to {}", self.user_path.display());

        *guard = updated.clone();
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_base_config() {
        let toml = r#"
dir_path = "/data/excels"

[app]
app_name = "DelayBoard"
auth = "Ops"

[redis]
host = "cache.local"
port = 6380
db = 2

[log]
log_file_desktop_app = "logs/app_{ts}.log"

[pages]
weekly = false
"#;

        let config = BaseConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.dir_path, "/data/excels");
        assert_eq!(config.app.app_name, "DelayBoard");
        assert_eq!(config.redis.as_ref().unwrap().url(), "redis://cache.local:6380/2");
        assert_eq!(config.cache.ttl_seconds, 3600);
        assert_eq!(config.watcher.tick_millis, 1000);
        assert!(!config.page_enabled("weekly"));
        assert!(config.page_enabled("home"));
    }

    #[test]
    fn test_empty_base_config_uses_defaults() {
        let config = BaseConfig::from_toml_str("").unwrap();
        assert_eq!(config.app.app_name, "DashBoardRam");
        assert_eq!(config.config.config_data_name, "config_data.toml");
        assert!(config.redis.is_none());
        assert_eq!(config.cache.reconnect_interval_seconds, 10);
    }

    #[test]
    fn test_missing_documents_are_created() {
        let dir = TempDir::new().unwrap();
        let base_path = dir.path().join("config.toml");
        let user_dir = dir.path().join("user");

        let store = ConfigStore::load_with_user_dir(&base_path, &user_dir).unwrap();
        assert!(base_path.exists());
        assert!(store.user_path().exists());
        assert!(store.user().auto_refresh);
        assert!(store.user().path_to_excel.is_empty());
    }

    #[test]
    fn test_update_user_persists_and_keeps_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let base_path = dir.path().join("config.toml");
        let user_dir = dir.path().join("user");
        fs::create_dir_all(&user_dir).unwrap();
        fs::write(user_dir.join("config_data.toml"), "theme = \"dark\"\n").unwrap();

        let store = ConfigStore::load_with_user_dir(&base_path, &user_dir).unwrap();
        store
            .update_user(|cfg| {
                cfg.path_to_excel = "/data/flights.xlsx".to_string();
                cfg.modification_date = Some("2024-01-10 08:30:00".to_string());
            })
            .unwrap();

        let reloaded = ConfigStore::load_with_user_dir(&base_path, &user_dir).unwrap();
        let user = reloaded.user();
        assert_eq!(user.path_to_excel, "/data/flights.xlsx");
        assert_eq!(user.modification_date.as_deref(), Some("2024-01-10 08:30:00"));
        assert_eq!(user.extra.get("theme").and_then(|v| v.as_str()), Some("dark"));
    }
}
