//! Delay code by weekday pivot.

use chrono::{Datelike, NaiveDate, Weekday};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{counts, grouped_counts};
use crate::core::domain::*;
use crate::transformations::frames::column_i32;

const WEEKDAY: &str = "weekday";

/// Column order of the pivot.
pub const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Counts of one delay code per weekday, Monday first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyPivotRow {
    pub delay_code: i32,
    pub days: [u64; 7],
    pub total: u64,
    /// Share of `total` per weekday
    pub day_pct: [f64; 7],
}

impl WeeklyPivotRow {
    pub fn count(&self, day: Weekday) -> u64 {
        self.days[day.num_days_from_monday() as usize]
    }

    pub fn pct(&self, day: Weekday) -> f64 {
        self.day_pct[day.num_days_from_monday() as usize]
    }
}

/// One row per delay code, sorted by total descending then code.
/// Missing weekday combinations are zero.
pub fn weekly_pivot(active: &LazyFrame) -> PolarsResult<Vec<WeeklyPivotRow>> {
    let with_weekday = active.clone().with_column(
        col(COL_DEP_DATETIME)
            .dt()
            .weekday()
            .cast(DataType::Int32)
            .alias(WEEKDAY),
    );
    let df = grouped_counts(&with_weekday, &[COL_DELAY_CODE, WEEKDAY])?;

    let mut table: BTreeMap<i32, [u64; 7]> = BTreeMap::new();
    for ((code, weekday), n) in column_i32(&df, COL_DELAY_CODE)?
        .into_iter()
        .zip(column_i32(&df, WEEKDAY)?)
        .zip(counts(&df)?)
    {
        // ISO weekday: Monday = 1
        match (code, weekday) {
            (Some(code), Some(weekday @ 1..=7)) => {
                table.entry(code).or_default()[(weekday - 1) as usize] += n;
            }
            _ => continue,
        }
    }

    let mut rows: Vec<WeeklyPivotRow> = table
        .into_iter()
        .map(|(delay_code, days)| {
            let total: u64 = days.iter().sum();
            WeeklyPivotRow {
                delay_code,
                days,
                total,
                day_pct: days.map(|n| percentage(n, total)),
            }
        })
        .collect();
    rows.sort_by(|a, b| b.total.cmp(&a.total).then(a.delay_code.cmp(&b.delay_code)));
    Ok(rows)
}

/// Weekdays covered by `[start, end]`, beginning with the weekday of `start`.
pub fn weekday_range(start: NaiveDate, end: NaiveDate) -> Vec<Weekday> {
    if end < start {
        return Vec::new();
    }
    let span = (end - start).num_days() + 1;
    let mut day = start.weekday();
    let mut days = Vec::with_capacity(span.min(7) as usize);
    for _ in 0..span.min(7) {
        days.push(day);
        day = day.succ();
    }
    days
}
