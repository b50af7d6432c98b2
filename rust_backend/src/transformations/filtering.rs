//! Filter engine: turns a [`FilterSpec`] into the `active` and `totals` views.

use chrono::NaiveDate;
use log::debug;
use polars::prelude::*;

use super::frames::{date_lit, date_range};
use crate::core::domain::*;
use crate::models::{FilterSpec, Segmentation};
use crate::preprocessing::any_of;

/// Views derived from one filter submission.
#[derive(Clone)]
pub struct FilterOutcome {
    pub active: LazyFrame,
    pub totals: LazyFrame,
    pub effective_start: Option<NaiveDate>,
    pub effective_end: Option<NaiveDate>,
}

/// Membership filters, applied in order: delay codes, subtypes, registrations.
pub fn apply_membership(mut lf: LazyFrame, spec: &FilterSpec) -> LazyFrame {
    if let Some(codes) = spec.delay_codes() {
        lf = lf.filter(any_of(COL_DELAY_CODE, codes.iter().copied()));
    }
    if let Some(subtypes) = spec.subtypes() {
        lf = lf.filter(any_of(COL_SUBTYPE, subtypes.iter().map(String::as_str)));
    }
    if let Some(registrations) = spec.registrations() {
        lf = lf.filter(any_of(
            COL_REGISTRATION,
            registrations.iter().map(String::as_str),
        ));
    }
    lf
}

/// Inclusive bounds on the departure date. Rows without a timestamp never match.
pub fn within_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Expr {
    let day = || col(COL_DEP_DATETIME).cast(DataType::Date);
    let mut predicate = col(COL_DEP_DATETIME).is_not_null();
    if let Some(start) = start {
        predicate = predicate.and(day().gt_eq(date_lit(Some(start))));
    }
    if let Some(end) = end {
        predicate = predicate.and(day().lt_eq(date_lit(Some(end))));
    }
    predicate
}

/// Attach `WINDOW_START` / `WINDOW_END`.
///
/// With segmentation each row falls in the tumbling window containing its
/// departure date, whose inclusive end is one day before the next window
/// starts. Without it every row shares `[start, end]`.
pub fn attach_windows(
    lf: LazyFrame,
    segmentation: Option<Segmentation>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> LazyFrame {
    match segmentation {
        Some(seg) => {
            let every = seg.every();
            lf.with_column(
                col(COL_DEP_DATETIME)
                    .cast(DataType::Date)
                    .dt()
                    .truncate(lit(every.clone()))
                    .alias(COL_WINDOW_START),
            )
            .with_column(
                col(COL_WINDOW_START)
                    .dt()
                    .offset_by(lit(every))
                    .dt()
                    .offset_by(lit("-1d"))
                    .alias(COL_WINDOW_END),
            )
        }
        None => lf.with_columns([
            date_lit(start).alias(COL_WINDOW_START),
            date_lit(end).alias(COL_WINDOW_END),
        ]),
    }
}

/// Apply `spec` to the baseline views.
///
/// When no explicit bound is given, the effective bounds come from
/// `unfiltered` for segmented specs and from `raw` otherwise.
pub fn apply_filter(
    raw: &LazyFrame,
    unfiltered: &LazyFrame,
    spec: &FilterSpec,
) -> PolarsResult<FilterOutcome> {
    let segmentation = spec.segmentation();

    let (effective_start, effective_end) = if spec.date_start.is_some() && spec.date_end.is_some() {
        (spec.date_start, spec.date_end)
    } else {
        let bounds_source = if segmentation.is_some() { unfiltered } else { raw };
        let range = date_range(bounds_source)?;
        (
            spec.date_start.or(range.map(|(min, _)| min)),
            spec.date_end.or(range.map(|(_, max)| max)),
        )
    };
    debug!(
        "Applying filter [{}] over {:?}..{:?}, segmentation {:?}",
        spec.fingerprint(),
        effective_start,
        effective_end,
        segmentation.map(|s| s.every())
    );

    let bounds = within_dates(spec.date_start, spec.date_end);

    let active = apply_membership(unfiltered.clone(), spec).filter(bounds.clone());
    let active = attach_windows(active, segmentation, effective_start, effective_end);

    let totals = attach_windows(
        raw.clone().filter(bounds),
        segmentation,
        effective_start,
        effective_end,
    )
    .group_by_stable([col(COL_WINDOW_START)])
    .agg([
        col(COL_WINDOW_END).first().alias(COL_WINDOW_END),
        len().cast(DataType::Int64).alias(COL_TOTAL_COUNT),
    ])
    .sort([COL_WINDOW_START], SortMultipleOptions::default());

    Ok(FilterOutcome {
        active,
        totals,
        effective_start,
        effective_end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SegmentationUnit;
    use crate::transformations::frames::{column_dates, column_i64};

    fn ts(y: i32, m: u32, d: u32) -> i64 {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis()
    }

    fn frame(rows: &[(i64, i32, &str)]) -> LazyFrame {
        let datetimes: Vec<i64> = rows.iter().map(|r| r.0).collect();
        let codes: Vec<i32> = rows.iter().map(|r| r.1).collect();
        let subtypes: Vec<&str> = rows.iter().map(|r| r.2).collect();
        DataFrame::new(vec![
            Column::from(
                Series::new(COL_DEP_DATETIME.into(), datetimes)
                    .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
                    .unwrap(),
            ),
            Column::from(Series::new(COL_DELAY_CODE.into(), codes)),
            Column::from(Series::new(COL_SUBTYPE.into(), subtypes)),
            Column::from(Series::new(
                COL_REGISTRATION.into(),
                vec!["CN-ROA"; rows.len()],
            )),
        ])
        .unwrap()
        .lazy()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_weekly_windows() {
        let lf = frame(&[(ts(2024, 1, 3), 41, "738"), (ts(2024, 1, 10), 41, "738")]);
        let spec = FilterSpec::default().with_segmentation(1, SegmentationUnit::Week);

        let outcome = apply_filter(&lf, &lf, &spec).unwrap();
        let active = outcome.active.collect().unwrap();

        assert_eq!(
            column_dates(&active, COL_WINDOW_START).unwrap(),
            vec![Some(date(2024, 1, 1)), Some(date(2024, 1, 8))]
        );
        assert_eq!(
            column_dates(&active, COL_WINDOW_END).unwrap(),
            vec![Some(date(2024, 1, 7)), Some(date(2024, 1, 14))]
        );
    }

    #[test]
    fn test_monthly_window_end() {
        let lf = frame(&[(ts(2024, 2, 14), 41, "738")]);
        let spec = FilterSpec::default().with_segmentation(1, SegmentationUnit::Month);
        let active = apply_filter(&lf, &lf, &spec).unwrap().active.collect().unwrap();

        assert_eq!(column_dates(&active, COL_WINDOW_START).unwrap(), vec![Some(date(2024, 2, 1))]);
        assert_eq!(column_dates(&active, COL_WINDOW_END).unwrap(), vec![Some(date(2024, 2, 29))]);
    }

    #[test]
    fn test_unsegmented_uses_raw_bounds() {
        let raw = frame(&[
            (ts(2024, 1, 1), 30, "738"),
            (ts(2024, 1, 5), 41, "738"),
            (ts(2024, 1, 20), 30, "321"),
        ]);
        let unfiltered = frame(&[(ts(2024, 1, 5), 41, "738")]);

        let outcome = apply_filter(&raw, &unfiltered, &FilterSpec::default()).unwrap();
        assert_eq!(outcome.effective_start, Some(date(2024, 1, 1)));
        assert_eq!(outcome.effective_end, Some(date(2024, 1, 20)));

        let totals = outcome.totals.collect().unwrap();
        assert_eq!(totals.height(), 1);
        assert_eq!(column_i64(&totals, COL_TOTAL_COUNT).unwrap(), vec![Some(3)]);
        assert_eq!(
            column_dates(&totals, COL_WINDOW_END).unwrap(),
            vec![Some(date(2024, 1, 20))]
        );
    }

    #[test]
    fn test_membership_and_date_bounds() {
        let lf = frame(&[
            (ts(2024, 1, 1), 41, "738"),
            (ts(2024, 1, 2), 46, "738"),
            (ts(2024, 1, 3), 41, "321"),
            (ts(2024, 1, 4), 41, "738"),
        ]);
        let spec = FilterSpec {
            delay_codes: Some([41].into_iter().collect()),
            subtypes: Some(["738".to_string()].into_iter().collect()),
            date_start: Some(date(2024, 1, 1)),
            date_end: Some(date(2024, 1, 3)),
            ..Default::default()
        };
        let active = apply_filter(&lf, &lf, &spec).unwrap().active.collect().unwrap();
        assert_eq!(active.height(), 1);
    }

    #[test]
    fn test_inverted_bounds_give_empty_views() {
        let lf = frame(&[(ts(2024, 1, 5), 41, "738")]);
        let spec = FilterSpec {
            date_start: Some(date(2024, 1, 10)),
            date_end: Some(date(2024, 1, 1)),
            ..Default::default()
        };
        let outcome = apply_filter(&lf, &lf, &spec).unwrap();
        assert_eq!(outcome.active.collect().unwrap().height(), 0);
        assert_eq!(outcome.totals.collect().unwrap().height(), 0);
    }

    #[test]
    fn test_empty_input_keeps_schema() {
        let lf = frame(&[]);
        let spec = FilterSpec::default().with_segmentation(1, SegmentationUnit::Day);
        let outcome = apply_filter(&lf, &lf, &spec).unwrap();

        let active = outcome.active.collect().unwrap();
        assert_eq!(active.height(), 0);
        assert!(active.column(COL_WINDOW_START).is_ok());
        assert!(active.column(COL_WINDOW_END).is_ok());

        let totals = outcome.totals.collect().unwrap();
        assert_eq!(totals.height(), 0);
        assert!(totals.column(COL_TOTAL_COUNT).is_ok());
    }
}
