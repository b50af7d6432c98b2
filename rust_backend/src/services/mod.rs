//! Aggregation library.
//!
//! Every calculator is a pure function from the filtered views to a vector of
//! typed rows. Counts come from the columnar engine; percentages are derived
//! from the unrounded counts and rounded to two decimals. Windowed tables are
//! sorted by `window_start`, then by their secondary dimension.
//!
//! # Modules
//!
//! - [`distributions`]: code summary, period/family/code shares, delay categories
//! - [`fleet`]: subtype, registration and airport shares
//! - [`performance`]: punctuality KPIs against the totals view
//! - [`weekly`]: delay code by weekday pivot
//! - [`summary`]: headline numbers for the home page

pub mod distributions;
pub mod fleet;
pub mod performance;
pub mod summary;
pub mod weekly;

use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::HashMap;

use crate::core::domain::*;
use crate::transformations::frames::column_dates;

pub use distributions::{
    code_by_family_by_period, code_summary, delay_category_by_period, family_by_period,
    period_distribution, CodeByFamilyByPeriodRow, CodeSummaryRow, DelayCategory,
    DelayCategoryByPeriodRow, FamilyByPeriodRow, PeriodDistributionRow,
};
pub use fleet::{
    registration_by_period, subtype_by_airport, subtype_by_period, subtype_by_registration,
    subtype_share, RegistrationByPeriodRow, SubtypeByAirportRow, SubtypeByPeriodRow,
    SubtypeByRegistrationRow, SubtypeShareRow,
};
pub use performance::{performance_kpis, PerformanceKpiRow};
pub use summary::{flight_summary, format_minutes, FlightSummary, LongestDelay};
pub use weekly::{weekday_range, weekly_pivot, WeeklyPivotRow, WEEKDAY_NAMES};

pub(crate) const COUNT: &str = "count";

/// Row counts per distinct `keys` tuple, in first-appearance order.
pub(crate) fn grouped_counts(lf: &LazyFrame, keys: &[&str]) -> PolarsResult<DataFrame> {
    let by: Vec<Expr> = keys.iter().map(|key| col(*key)).collect();
    lf.clone()
        .group_by_stable(by)
        .agg([len().cast(DataType::Int64).alias(COUNT)])
        .collect()
}

/// `(window_start, window_end)` of each row; rows without a window are `None`.
pub(crate) fn windows(df: &DataFrame) -> PolarsResult<Vec<Option<(NaiveDate, NaiveDate)>>> {
    let starts = column_dates(df, COL_WINDOW_START)?;
    let ends = column_dates(df, COL_WINDOW_END)?;
    Ok(starts
        .into_iter()
        .zip(ends)
        .map(|(start, end)| start.zip(end))
        .collect())
}

/// Denominator lookup; a missing group counts as zero.
pub(crate) fn total_of<K: std::hash::Hash + Eq>(totals: &HashMap<K, u64>, key: &K) -> u64 {
    totals.get(key).copied().unwrap_or(0)
}

pub(crate) fn counts(df: &DataFrame) -> PolarsResult<Vec<u64>> {
    Ok(crate::transformations::frames::column_i64(df, COUNT)?
        .into_iter()
        .map(|c| c.unwrap_or(0).max(0) as u64)
        .collect())
}
