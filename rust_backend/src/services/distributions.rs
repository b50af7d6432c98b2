//! Delay distributions over codes, families and periods.

use chrono::NaiveDate;
use log::debug;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{counts, grouped_counts, total_of, windows, COUNT};
use crate::core::domain::*;
use crate::transformations::frames::{column_i32, column_strings};

const IS_LONG: &str = "is_long";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeSummaryRow {
    pub delay_code: i32,
    pub occurrences: u64,
    pub description: Option<String>,
    /// `"AP (n)"` pairs by descending count, joined with `", "`
    pub airports_concat: String,
    pub airport_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodDistributionRow {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub count: u64,
    pub percentage_of_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyByPeriodRow {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub family: String,
    pub count: u64,
    pub percentage_of_period: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeByFamilyByPeriodRow {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub family: String,
    pub delay_code: i32,
    pub count: u64,
    pub percentage_of_family: f64,
    pub percentage_of_period_total: f64,
}

/// Delay duration bucket around [`LONG_DELAY_MINUTES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayCategory {
    UpTo15Min,
    Over15Min,
}

impl DelayCategory {
    pub fn label(&self) -> &'static str {
        match self {
            DelayCategory::UpTo15Min => "<= 15 min",
            DelayCategory::Over15Min => "> 15 min",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayCategoryByPeriodRow {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub category: DelayCategory,
    pub count: u64,
    pub percentage_of_period: f64,
}

/// Occurrences per delay code with the airports where they happened.
///
/// Rows are ordered by occurrences (descending), then code. Airport ties keep
/// first-appearance order.
pub fn code_summary(active: &LazyFrame) -> PolarsResult<Vec<CodeSummaryRow>> {
    let per_code = active
        .clone()
        .group_by_stable([col(COL_DELAY_CODE)])
        .agg([
            len().cast(DataType::Int64).alias(COUNT),
            col(COL_CODE_DESCRIPTION).first().alias(COL_CODE_DESCRIPTION),
        ])
        .collect()?;
    let per_airport = grouped_counts(active, &[COL_DELAY_CODE, COL_DEP_AIRPORT])?;

    let mut airports: HashMap<i32, Vec<(String, u64)>> = HashMap::new();
    for ((code, airport), n) in column_i32(&per_airport, COL_DELAY_CODE)?
        .into_iter()
        .zip(column_strings(&per_airport, COL_DEP_AIRPORT)?)
        .zip(counts(&per_airport)?)
    {
        if let (Some(code), Some(airport)) = (code, airport) {
            airports.entry(code).or_default().push((airport, n));
        }
    }

    let mut rows: Vec<CodeSummaryRow> = Vec::with_capacity(per_code.height());
    for ((code, description), occurrences) in column_i32(&per_code, COL_DELAY_CODE)?
        .into_iter()
        .zip(column_strings(&per_code, COL_CODE_DESCRIPTION)?)
        .zip(counts(&per_code)?)
    {
        let Some(code) = code else { continue };
        let mut pairs = airports.remove(&code).unwrap_or_default();
        pairs.sort_by(|a, b| b.1.cmp(&a.1));
        let airports_concat = pairs
            .iter()
            .map(|(airport, n)| format!("{} ({})", airport, n))
            .collect::<Vec<_>>()
            .join(", ");

        rows.push(CodeSummaryRow {
            delay_code: code,
            occurrences,
            description,
            airports_concat,
            airport_count: pairs.len(),
        });
    }

    rows.sort_by(|a, b| {
        b.occurrences
            .cmp(&a.occurrences)
            .then(a.delay_code.cmp(&b.delay_code))
    });
    debug!("Code summary: {} codes", rows.len());
    Ok(rows)
}

/// Share of all active delays falling in each window.
pub fn period_distribution(active: &LazyFrame) -> PolarsResult<Vec<PeriodDistributionRow>> {
    let df = grouped_counts(active, &[COL_WINDOW_START, COL_WINDOW_END])?;
    let counts = counts(&df)?;
    let total: u64 = counts.iter().sum();

    let mut rows: Vec<PeriodDistributionRow> = windows(&df)?
        .into_iter()
        .zip(counts)
        .filter_map(|(window, count)| {
            let (window_start, window_end) = window?;
            Some(PeriodDistributionRow {
                window_start,
                window_end,
                count,
                percentage_of_total: percentage(count, total),
            })
        })
        .collect();
    rows.sort_by_key(|r| r.window_start);
    Ok(rows)
}

/// Share of each delay family within its window.
pub fn family_by_period(active: &LazyFrame) -> PolarsResult<Vec<FamilyByPeriodRow>> {
    let df = grouped_counts(active, &[COL_WINDOW_START, COL_WINDOW_END, COL_FAMILY])?;
    let keyed: Vec<_> = windows(&df)?
        .into_iter()
        .zip(column_strings(&df, COL_FAMILY)?)
        .zip(counts(&df)?)
        .filter_map(|((window, family), count)| {
            Some((window?, family.unwrap_or_default(), count))
        })
        .collect();

    let mut per_period: HashMap<NaiveDate, u64> = HashMap::new();
    for ((start, _), _, count) in &keyed {
        *per_period.entry(*start).or_default() += count;
    }

    let mut rows: Vec<FamilyByPeriodRow> = keyed
        .into_iter()
        .map(|((window_start, window_end), family, count)| FamilyByPeriodRow {
            percentage_of_period: percentage(count, total_of(&per_period, &window_start)),
            window_start,
            window_end,
            family,
            count,
        })
        .collect();
    rows.sort_by(|a, b| (a.window_start, &a.family).cmp(&(b.window_start, &b.family)));
    Ok(rows)
}

/// Share of each delay code within its family, and within its window.
pub fn code_by_family_by_period(active: &LazyFrame) -> PolarsResult<Vec<CodeByFamilyByPeriodRow>> {
    let df = grouped_counts(
        active,
        &[COL_WINDOW_START, COL_WINDOW_END, COL_FAMILY, COL_DELAY_CODE],
    )?;
    let keyed: Vec<_> = windows(&df)?
        .into_iter()
        .zip(column_strings(&df, COL_FAMILY)?)
        .zip(column_i32(&df, COL_DELAY_CODE)?)
        .zip(counts(&df)?)
        .filter_map(|(((window, family), code), count)| {
            Some((window?, family.unwrap_or_default(), code?, count))
        })
        .collect();

    let mut per_period: HashMap<NaiveDate, u64> = HashMap::new();
    let mut per_family: HashMap<(NaiveDate, String), u64> = HashMap::new();
    for ((start, _), family, _, count) in &keyed {
        *per_period.entry(*start).or_default() += count;
        *per_family.entry((*start, family.clone())).or_default() += count;
    }

    let mut rows: Vec<CodeByFamilyByPeriodRow> = keyed
        .into_iter()
        .map(|((window_start, window_end), family, delay_code, count)| {
            let family_total = total_of(&per_family, &(window_start, family.clone()));
            CodeByFamilyByPeriodRow {
                percentage_of_family: percentage(count, family_total),
                percentage_of_period_total: percentage(count, total_of(&per_period, &window_start)),
                window_start,
                window_end,
                family,
                delay_code,
                count,
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        (a.window_start, &a.family, a.delay_code).cmp(&(b.window_start, &b.family, b.delay_code))
    });
    Ok(rows)
}

/// Short versus long delays per window. Both buckets are listed for every window.
pub fn delay_category_by_period(
    active: &LazyFrame,
) -> PolarsResult<Vec<DelayCategoryByPeriodRow>> {
    let flagged = active.clone().with_column(
        col(COL_DELAY_MINUTES)
            .gt(lit(LONG_DELAY_MINUTES))
            .alias(IS_LONG),
    );
    let df = grouped_counts(&flagged, &[COL_WINDOW_START, COL_WINDOW_END, IS_LONG])?;
    let is_long: Vec<Option<bool>> = df.column(IS_LONG)?.bool()?.into_iter().collect();

    let mut buckets: HashMap<(NaiveDate, NaiveDate), [u64; 2]> = HashMap::new();
    for ((window, long), count) in windows(&df)?.into_iter().zip(is_long).zip(counts(&df)?) {
        let (Some(window), Some(long)) = (window, long) else { continue };
        buckets.entry(window).or_default()[long as usize] += count;
    }

    let mut keys: Vec<(NaiveDate, NaiveDate)> = buckets.keys().copied().collect();
    keys.sort();

    let mut rows = Vec::with_capacity(keys.len() * 2);
    for (window_start, window_end) in keys {
        let bucket = buckets.get(&(window_start, window_end)).copied().unwrap_or_default();
        let total = bucket[0] + bucket[1];
        for (category, count) in [
            (DelayCategory::UpTo15Min, bucket[0]),
            (DelayCategory::Over15Min, bucket[1]),
        ] {
            rows.push(DelayCategoryByPeriodRow {
                window_start,
                window_end,
                category,
                count,
                percentage_of_period: percentage(count, total),
            });
        }
    }
    Ok(rows)
}
