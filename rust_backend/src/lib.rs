//! Flight-delay analytics core.
//!
//! Loads a flight-delay workbook into columnar views, applies user filters,
//! computes memoised aggregate tables and keeps everything consistent as the
//! workbook changes on disk.
//!
//! - [`io`] / [`parsing`] / [`preprocessing`]: workbook discovery, decoding and baseline views
//! - [`registry`]: generation-stamped snapshots of `raw`, `unfiltered`, `active`, `totals`
//! - [`transformations`]: filter engine, window bounds and suggestion lists
//! - [`services`]: aggregate calculators
//! - [`cache`]: best-effort result cache (Redis or in-memory)
//! - [`dashboard`] / [`watcher`] / [`events`]: reactive orchestration

pub mod cache;
pub mod config;
pub mod core;
pub mod dashboard;
pub mod events;
pub mod io;
pub mod logging;
pub mod models;
pub mod parsing;
pub mod preprocessing;
pub mod registry;
pub mod services;
pub mod transformations;
pub mod watcher;

pub use crate::core::{DashboardError, DashboardResult, DataStatus};
pub use dashboard::Dashboard;
pub use events::DashboardEvent;
pub use models::{FilterForm, FilterSpec};
