//! Domain constants and small value types for flight-delay records.
//!
//! A flight record is one row of the source workbook: a scheduled departure with
//! its delay code, delay duration, aircraft registration and subtype. The loader
//! keeps the workbook column names so downstream tables stay recognisable to
//! operators who know the export format.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Scheduled departure day (date cell in the workbook).
pub const COL_DEP_DAY: &str = "DEP_DAY_SCHED";
/// Scheduled departure time of day, formatted `HH:MM`.
pub const COL_DEP_TIME: &str = "DEP_TIME_SCHED";
pub const COL_DELAY_CODE: &str = "DELAY_CODE";
/// Delay duration in minutes.
pub const COL_DELAY_MINUTES: &str = "DELAY_TIME";
pub const COL_SUBTYPE: &str = "AC_SUBTYPE";
pub const COL_REGISTRATION: &str = "AC_REGISTRATION";
pub const COL_DEP_AIRPORT: &str = "DEP_AP_SCHED";
pub const COL_FAMILY: &str = "FAMILLE_DR";
pub const COL_CODE_DESCRIPTION: &str = "LIB_CODE_DR";

/// Combined departure date and time, derived on load.
pub const COL_DEP_DATETIME: &str = "DEP_DATETIME";
/// Start of the time window a row belongs to, attached by the filter engine.
pub const COL_WINDOW_START: &str = "WINDOW_START";
/// Inclusive end of the time window a row belongs to.
pub const COL_WINDOW_END: &str = "WINDOW_END";
/// Number of raw flights in a window, held by the totals view.
pub const COL_TOTAL_COUNT: &str = "total_count";

/// Columns the workbook must provide.
pub const REQUIRED_COLUMNS: [&str; 9] = [
    COL_DEP_DAY,
    COL_DEP_TIME,
    COL_DELAY_CODE,
    COL_DELAY_MINUTES,
    COL_SUBTYPE,
    COL_REGISTRATION,
    COL_DEP_AIRPORT,
    COL_FAMILY,
    COL_CODE_DESCRIPTION,
];

/// Registrations of the carrier's own fleet start with this prefix.
pub const CARRIER_PREFIX: &str = "CN";

/// Technical delay family: codes 41..=47 and 51, 52.
pub const TECHNICAL_DELAY_CODES: [i32; 9] = [41, 42, 43, 44, 45, 46, 47, 51, 52];

/// Codes singled out by the performance KPIs.
pub const KPI_DELAY_CODES: [i32; 2] = [41, 46];

/// Threshold (minutes) separating short delays from long ones.
pub const LONG_DELAY_MINUTES: i64 = 15;

/// Whether a workbook is currently selected and readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataStatus {
    Selected,
    Unselected,
}

impl DataStatus {
    pub fn from_selected(selected: bool) -> Self {
        if selected {
            DataStatus::Selected
        } else {
            DataStatus::Unselected
        }
    }
}

impl std::fmt::Display for DataStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataStatus::Selected => write!(f, "selected"),
            DataStatus::Unselected => write!(f, "unselected"),
        }
    }
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Days since 1970-01-01, the physical representation of a polars `Date`.
pub fn date_to_days(date: NaiveDate) -> i32 {
    (date - epoch()).num_days() as i32
}

/// Inverse of [`date_to_days`].
pub fn days_to_date(days: i32) -> NaiveDate {
    epoch() + Duration::days(days as i64)
}

/// Round half away from zero to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentage of `part` in `whole`, rounded to two decimals. Zero when `whole` is zero.
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(part as f64 * 100.0 / whole as f64)
}
