//! Punctuality KPIs.
//!
//! Unlike the other calculators, the denominators come from the `totals`
//! view: every carrier flight in the window, delayed or not.

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::windows;
use crate::core::domain::*;
use crate::preprocessing::any_of;
use crate::transformations::frames::{column_dates, column_i64};

const DELAYED: &str = "delayed_count";
const DELAYED_GT15: &str = "delayed_gt15_count";
const DELAYED_GT15_KPI_CODES: &str = "delayed_gt15_code41_46_count";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceKpiRow {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub total_count: u64,
    pub delayed_count: u64,
    pub delayed_gt15_count: u64,
    pub delayed_gt15_code41_46_count: u64,
    pub per_flights_not_delayed: f64,
    pub per_delayed_flights_not_with_15min: f64,
    pub per_delayed_flights_15min_not_with_41_46: f64,
}

/// `100 * (1 - part / whole)`, rounded to two decimals.
fn complement_pct(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(100.0 * (1.0 - part as f64 / whole as f64))
}

fn non_negative(values: Vec<Option<i64>>) -> Vec<u64> {
    values
        .into_iter()
        .map(|v| v.unwrap_or(0).max(0) as u64)
        .collect()
}

/// One row per totals window; windows with no active delay score 100%.
pub fn performance_kpis(
    active: &LazyFrame,
    totals: &LazyFrame,
) -> PolarsResult<Vec<PerformanceKpiRow>> {
    let long_delay = col(COL_DELAY_MINUTES).gt(lit(LONG_DELAY_MINUTES));
    let delayed = active
        .clone()
        .group_by_stable([col(COL_WINDOW_START)])
        .agg([
            len().cast(DataType::Int64).alias(DELAYED),
            long_delay
                .clone()
                .cast(DataType::Int64)
                .sum()
                .alias(DELAYED_GT15),
            long_delay
                .and(any_of(COL_DELAY_CODE, KPI_DELAY_CODES))
                .cast(DataType::Int64)
                .sum()
                .alias(DELAYED_GT15_KPI_CODES),
        ])
        .collect()?;

    let mut per_window: HashMap<NaiveDate, [u64; 3]> = HashMap::new();
    let starts = column_dates(&delayed, COL_WINDOW_START)?;
    let all = non_negative(column_i64(&delayed, DELAYED)?);
    let gt15 = non_negative(column_i64(&delayed, DELAYED_GT15)?);
    let kpi = non_negative(column_i64(&delayed, DELAYED_GT15_KPI_CODES)?);
    for (i, start) in starts.into_iter().enumerate() {
        if let Some(start) = start {
            per_window.insert(start, [all[i], gt15[i], kpi[i]]);
        }
    }

    let totals = totals.clone().collect()?;
    let total_counts = non_negative(column_i64(&totals, COL_TOTAL_COUNT)?);

    let mut rows: Vec<PerformanceKpiRow> = windows(&totals)?
        .into_iter()
        .zip(total_counts)
        .filter_map(|(window, total_count)| {
            let (window_start, window_end) = window?;
            let [delayed, gt15, kpi] = per_window.get(&window_start).copied().unwrap_or_default();
            Some(PerformanceKpiRow {
                window_start,
                window_end,
                total_count,
                delayed_count: delayed,
                delayed_gt15_count: gt15,
                delayed_gt15_code41_46_count: kpi,
                per_flights_not_delayed: complement_pct(delayed, total_count),
                per_delayed_flights_not_with_15min: complement_pct(gt15, total_count),
                per_delayed_flights_15min_not_with_41_46: complement_pct(kpi, total_count),
            })
        })
        .collect();
    rows.sort_by_key(|r| r.window_start);
    Ok(rows)
}
