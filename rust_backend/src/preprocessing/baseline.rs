//! Baseline filters applied once per load, before any user filter.
//!
//! `raw` keeps the carrier's own fleet; `unfiltered` further keeps technical
//! delays with a non-zero duration.

use log::debug;
use polars::prelude::*;

use crate::core::domain::*;

/// `column` equals one of `values`. An empty value list matches nothing.
pub fn any_of<L, I>(column: &str, values: I) -> Expr
where
    L: Literal,
    I: IntoIterator<Item = L>,
{
    values
        .into_iter()
        .map(|value| col(column).eq(lit(value)))
        .reduce(|acc, expr| acc.or(expr))
        .unwrap_or_else(|| lit(false))
}

/// Keep registrations of the carrier's own fleet.
pub fn filter_carrier(lf: LazyFrame) -> LazyFrame {
    debug!("Filtering registrations on prefix '{}'", CARRIER_PREFIX);
    lf.filter(
        col(COL_REGISTRATION)
            .str()
            .starts_with(lit(CARRIER_PREFIX)),
    )
}

/// Delay codes are compared as 32-bit integers everywhere downstream.
pub fn coerce_delay_code(lf: LazyFrame) -> LazyFrame {
    lf.with_column(col(COL_DELAY_CODE).cast(DataType::Int32))
}

pub fn filter_non_zero_delay(lf: LazyFrame) -> LazyFrame {
    lf.filter(col(COL_DELAY_MINUTES).neq(lit(0i64)))
}

/// Keep the technical delay family only. Code membership is authoritative;
/// the family label is not consulted.
pub fn filter_technical(lf: LazyFrame) -> LazyFrame {
    lf.filter(any_of(COL_DELAY_CODE, TECHNICAL_DELAY_CODES))
}

/// Build the `(raw, unfiltered)` pair from a freshly parsed flight frame.
pub fn preprocess(frame: DataFrame) -> (LazyFrame, LazyFrame) {
    let raw = coerce_delay_code(filter_carrier(frame.lazy()));
    let unfiltered = filter_technical(filter_non_zero_delay(raw.clone()));
    (raw, unfiltered)
}
