//! Read-only views used to populate dependent dropdowns.
//!
//! A suggestion view applies the current selection with one dimension left
//! out, so the dropdown for that dimension lists every value still reachable
//! through the other filters.

use polars::prelude::*;
use std::collections::BTreeSet;

use super::filtering::{apply_membership, within_dates};
use super::frames::{column_i32, column_strings};
use crate::core::domain::*;
use crate::models::{Dimension, FilterSpec};

fn dimension_column(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Subtypes => COL_SUBTYPE,
        Dimension::Registrations => COL_REGISTRATION,
        Dimension::DelayCodes => COL_DELAY_CODE,
    }
}

/// `unfiltered` filtered by everything in `spec` except `excluded`.
pub fn suggestion_view(
    unfiltered: &LazyFrame,
    spec: &FilterSpec,
    excluded: Dimension,
) -> LazyFrame {
    let spec = spec.without(excluded);
    apply_membership(unfiltered.clone(), &spec)
        .filter(within_dates(spec.date_start, spec.date_end))
}

/// Distinct values of `dimension` reachable under the other filters, sorted.
///
/// Delay codes sort numerically.
pub fn list_dimension_values(
    unfiltered: &LazyFrame,
    spec: &FilterSpec,
    dimension: Dimension,
) -> PolarsResult<Vec<String>> {
    let column = dimension_column(dimension);
    let df = suggestion_view(unfiltered, spec, dimension)
        .select([col(column)])
        .collect()?;

    let values = match dimension {
        Dimension::DelayCodes => column_i32(&df, column)?
            .into_iter()
            .flatten()
            .collect::<BTreeSet<i32>>()
            .into_iter()
            .map(|code| code.to_string())
            .collect(),
        _ => column_strings(&df, column)?
            .into_iter()
            .flatten()
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect(),
    };
    Ok(values)
}
