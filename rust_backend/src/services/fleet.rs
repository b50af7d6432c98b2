//! Fleet-oriented shares: subtypes, registrations and departure airports.

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{counts, grouped_counts, total_of, windows};
use crate::core::domain::*;
use crate::transformations::frames::column_strings;

/// One `(window, outer, inner)` cell with its share of the `(window, outer)` group.
struct NestedShare {
    window_start: NaiveDate,
    window_end: NaiveDate,
    outer: String,
    inner: String,
    count: u64,
    percentage: f64,
}

/// Counts per `(window, outer, inner)`, as a share of each `(window, outer)` group,
/// sorted by window, outer, inner.
fn nested_shares(active: &LazyFrame, outer: &str, inner: &str) -> PolarsResult<Vec<NestedShare>> {
    let df = grouped_counts(active, &[COL_WINDOW_START, COL_WINDOW_END, outer, inner])?;
    let keyed: Vec<_> = windows(&df)?
        .into_iter()
        .zip(column_strings(&df, outer)?)
        .zip(column_strings(&df, inner)?)
        .zip(counts(&df)?)
        .filter_map(|(((window, o), i), count)| {
            Some((window?, o.unwrap_or_default(), i.unwrap_or_default(), count))
        })
        .collect();

    let mut group_totals: HashMap<(NaiveDate, String), u64> = HashMap::new();
    for ((start, _), o, _, count) in &keyed {
        *group_totals.entry((*start, o.clone())).or_default() += count;
    }

    let mut cells: Vec<NestedShare> = keyed
        .into_iter()
        .map(|((window_start, window_end), outer, inner, count)| {
            let total = total_of(&group_totals, &(window_start, outer.clone()));
            NestedShare {
                window_start,
                window_end,
                outer,
                inner,
                count,
                percentage: percentage(count, total),
            }
        })
        .collect();
    cells.sort_by(|a, b| {
        (a.window_start, &a.outer, &a.inner).cmp(&(b.window_start, &b.outer, &b.inner))
    });
    Ok(cells)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtypeByPeriodRow {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub subtype: String,
    pub family: String,
    pub count: u64,
    pub percentage_of_subtype: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationByPeriodRow {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub registration: String,
    pub family: String,
    pub count: u64,
    pub percentage_of_registration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtypeShareRow {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub subtype: String,
    pub count: u64,
    pub percentage_of_period: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtypeByRegistrationRow {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub subtype: String,
    pub registration: String,
    pub count: u64,
    pub percentage_of_subtype: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtypeByAirportRow {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub airport: String,
    pub subtype: String,
    pub count: u64,
    pub percentage_of_airport: f64,
}

/// Family mix of each subtype per window.
pub fn subtype_by_period(active: &LazyFrame) -> PolarsResult<Vec<SubtypeByPeriodRow>> {
    Ok(nested_shares(active, COL_SUBTYPE, COL_FAMILY)?
        .into_iter()
        .map(|c| SubtypeByPeriodRow {
            window_start: c.window_start,
            window_end: c.window_end,
            subtype: c.outer,
            family: c.inner,
            count: c.count,
            percentage_of_subtype: c.percentage,
        })
        .collect())
}

/// Family mix of each registration per window.
pub fn registration_by_period(active: &LazyFrame) -> PolarsResult<Vec<RegistrationByPeriodRow>> {
    Ok(nested_shares(active, COL_REGISTRATION, COL_FAMILY)?
        .into_iter()
        .map(|c| RegistrationByPeriodRow {
            window_start: c.window_start,
            window_end: c.window_end,
            registration: c.outer,
            family: c.inner,
            count: c.count,
            percentage_of_registration: c.percentage,
        })
        .collect())
}

/// Registrations' share of their subtype's delays per window.
pub fn subtype_by_registration(active: &LazyFrame) -> PolarsResult<Vec<SubtypeByRegistrationRow>> {
    Ok(nested_shares(active, COL_SUBTYPE, COL_REGISTRATION)?
        .into_iter()
        .map(|c| SubtypeByRegistrationRow {
            window_start: c.window_start,
            window_end: c.window_end,
            subtype: c.outer,
            registration: c.inner,
            count: c.count,
            percentage_of_subtype: c.percentage,
        })
        .collect())
}

/// Subtypes' share of each departure airport's delays per window.
pub fn subtype_by_airport(active: &LazyFrame) -> PolarsResult<Vec<SubtypeByAirportRow>> {
    Ok(nested_shares(active, COL_DEP_AIRPORT, COL_SUBTYPE)?
        .into_iter()
        .map(|c| SubtypeByAirportRow {
            window_start: c.window_start,
            window_end: c.window_end,
            airport: c.outer,
            subtype: c.inner,
            count: c.count,
            percentage_of_airport: c.percentage,
        })
        .collect())
}

/// Each subtype's share of the window's delays.
pub fn subtype_share(active: &LazyFrame) -> PolarsResult<Vec<SubtypeShareRow>> {
    let df = grouped_counts(active, &[COL_WINDOW_START, COL_WINDOW_END, COL_SUBTYPE])?;
    let keyed: Vec<_> = windows(&df)?
        .into_iter()
        .zip(column_strings(&df, COL_SUBTYPE)?)
        .zip(counts(&df)?)
        .filter_map(|((window, subtype), count)| {
            Some((window?, subtype.unwrap_or_default(), count))
        })
        .collect();

    let mut per_period: HashMap<NaiveDate, u64> = HashMap::new();
    for ((start, _), _, count) in &keyed {
        *per_period.entry(*start).or_default() += count;
    }

    let mut rows: Vec<SubtypeShareRow> = keyed
        .into_iter()
        .map(|((window_start, window_end), subtype, count)| SubtypeShareRow {
            percentage_of_period: percentage(count, total_of(&per_period, &window_start)),
            window_start,
            window_end,
            subtype,
            count,
        })
        .collect();
    rows.sort_by(|a, b| (a.window_start, &a.subtype).cmp(&(b.window_start, &b.subtype)));
    Ok(rows)
}
