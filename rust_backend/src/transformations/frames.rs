//! Typed extraction of small, collected result frames.

use chrono::NaiveDate;
use polars::prelude::*;

use crate::core::domain::*;

pub fn column_dates(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<NaiveDate>>> {
    let days = df.column(name)?.cast(&DataType::Int32)?;
    Ok(days.i32()?.into_iter().map(|d| d.map(days_to_date)).collect())
}

pub fn column_i64(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<i64>>> {
    let values = df.column(name)?.cast(&DataType::Int64)?;
    Ok(values.i64()?.into_iter().collect())
}

pub fn column_i32(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<i32>>> {
    let values = df.column(name)?.cast(&DataType::Int32)?;
    Ok(values.i32()?.into_iter().collect())
}

pub fn column_strings(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let values = df.column(name)?.cast(&DataType::String)?;
    Ok(values
        .str()?
        .into_iter()
        .map(|s| s.map(str::to_string))
        .collect())
}

/// Departure datetimes as naive timestamps.
pub fn column_datetimes(
    df: &DataFrame,
    name: &str,
) -> PolarsResult<Vec<Option<chrono::NaiveDateTime>>> {
    Ok(column_i64(df, name)?
        .into_iter()
        .map(|ms| ms.and_then(chrono::DateTime::from_timestamp_millis).map(|dt| dt.naive_utc()))
        .collect())
}

/// Earliest and latest departure date in `lf`, ignoring rows without a timestamp.
pub fn date_range(lf: &LazyFrame) -> PolarsResult<Option<(NaiveDate, NaiveDate)>> {
    let df = lf
        .clone()
        .select([
            col(COL_DEP_DATETIME).cast(DataType::Date).min().alias("min"),
            col(COL_DEP_DATETIME).cast(DataType::Date).max().alias("max"),
        ])
        .collect()?;
    let min = column_dates(&df, "min")?.first().copied().flatten();
    let max = column_dates(&df, "max")?.first().copied().flatten();
    Ok(min.zip(max))
}

/// Literal of type `Date`, null when absent.
pub fn date_lit(date: Option<NaiveDate>) -> Expr {
    match date {
        Some(d) => lit(date_to_days(d)).cast(DataType::Date),
        None => lit(NULL).cast(DataType::Date),
    }
}
