//! Error types for the dataset lifecycle, filtering and caching.

use std::path::PathBuf;

/// Result type for dashboard operations
pub type DashboardResult<T> = Result<T, DashboardError>;

/// Why a workbook could not be turned into a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadErrorKind {
    UnreadableSource,
    MissingColumn,
    ParseError,
}

impl std::fmt::Display for LoadErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LoadErrorKind::UnreadableSource => "unreadable source",
            LoadErrorKind::MissingColumn => "missing column",
            LoadErrorKind::ParseError => "parse error",
        };
        f.write_str(label)
    }
}

/// Loader failure. The registry keeps its previous views when this is raised.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct LoadError {
    pub kind: LoadErrorKind,
    pub message: String,
}

impl LoadError {
    pub fn unreadable(message: impl Into<String>) -> Self {
        Self {
            kind: LoadErrorKind::UnreadableSource,
            message: message.into(),
        }
    }

    pub fn missing_column(column: &str) -> Self {
        Self {
            kind: LoadErrorKind::MissingColumn,
            message: format!("Missing required column: {}", column),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            kind: LoadErrorKind::ParseError,
            message: message.into(),
        }
    }
}

impl From<polars::prelude::PolarsError> for LoadError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        LoadError::parse(err.to_string())
    }
}

/// Error type for dashboard operations
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("Configuration missing: {0}")]
    ConfigMissing(String),

    #[error("Workbook path lost: {}", .0.display())]
    PathLost(PathBuf),

    #[error("Load failed ({0})")]
    LoadFailed(#[from] LoadError),

    #[error("Invalid filter: {0}")]
    InvalidFilterSpec(String),

    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DashboardError {
    /// Only load failures and rejected filters are shown to the operator; every
    /// other fault is recovered where it happens.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            DashboardError::LoadFailed(_) | DashboardError::InvalidFilterSpec(_)
        )
    }
}

impl From<polars::prelude::PolarsError> for DashboardError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        DashboardError::QueryError(err.to_string())
    }
}
