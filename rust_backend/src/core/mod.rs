//! Core domain definitions for flight-delay analytics.
//!
//! This module holds the workbook column names, the baseline filtering constants
//! (carrier prefix and technical delay codes) and the crate-wide error types.

pub mod domain;
pub mod error;

pub use domain::*;
pub use error::{DashboardError, DashboardResult, LoadError, LoadErrorKind};
