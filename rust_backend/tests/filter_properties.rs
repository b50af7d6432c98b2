//! Property tests for the filter engine and the aggregate calculators.
//!
//! Flights are generated in memory and run through the same baseline
//! preprocessing as a loaded workbook.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use chrono::NaiveDate;
use polars::prelude::*;
use proptest::prelude::*;

use delay_dashboard::cache::ComputationCache;
use delay_dashboard::core::*;
use delay_dashboard::io::{DatasetLoader, LoadedDataset};
use delay_dashboard::models::{FilterSpec, SegmentationUnit};
use delay_dashboard::services;
use delay_dashboard::transformations::apply_filter;
use delay_dashboard::transformations::frames::{
    column_dates, column_datetimes, column_i32, column_i64, column_strings,
};

// ==================== Generators ====================

const SUBTYPES: [&str; 3] = ["320", "321", "738"];
const REGISTRATIONS: [&str; 4] = ["CN-ROA", "CN-ROB", "CN-ROC", "F-GKXA"];
const AIRPORTS: [&str; 3] = ["AGA", "CMN", "RAK"];
const CODES: [i32; 12] = [0, 11, 30, 41, 42, 43, 44, 45, 46, 47, 51, 52];

#[derive(Debug, Clone)]
struct Flight {
    day: u32,
    minute_of_day: u32,
    code: i32,
    minutes: i64,
    subtype: usize,
    registration: usize,
    airport: usize,
}

fn flight() -> impl Strategy<Value = Flight> {
    (
        0u32..120,
        0u32..1440,
        prop::sample::select(CODES.to_vec()),
        0i64..90,
        0usize..SUBTYPES.len(),
        0usize..REGISTRATIONS.len(),
        0usize..AIRPORTS.len(),
    )
        .prop_map(|(day, minute_of_day, code, minutes, subtype, registration, airport)| Flight {
            day,
            minute_of_day,
            code,
            minutes,
            subtype,
            registration,
            airport,
        })
}

fn base_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn dataset(flights: &[Flight]) -> LoadedDataset {
    let stamps: Vec<i64> = flights
        .iter()
        .map(|f| {
            (base_day() + chrono::Duration::days(f.day as i64))
                .and_hms_opt(f.minute_of_day / 60, f.minute_of_day % 60, 0)
                .unwrap()
                .and_utc()
                .timestamp_millis()
        })
        .collect();
    let frame = df!(
        COL_DEP_DATETIME => stamps,
        COL_DELAY_CODE => flights.iter().map(|f| f.code).collect::<Vec<_>>(),
        COL_DELAY_MINUTES => flights.iter().map(|f| f.minutes).collect::<Vec<_>>(),
        COL_SUBTYPE => flights.iter().map(|f| SUBTYPES[f.subtype]).collect::<Vec<_>>(),
        COL_REGISTRATION => flights.iter().map(|f| REGISTRATIONS[f.registration]).collect::<Vec<_>>(),
        COL_DEP_AIRPORT => flights.iter().map(|f| AIRPORTS[f.airport]).collect::<Vec<_>>(),
        COL_FAMILY => flights.iter().map(|f| if f.code >= 41 { "Technique" } else { "Autre" }).collect::<Vec<_>>(),
        COL_CODE_DESCRIPTION => flights.iter().map(|f| format!("code {}", f.code)).collect::<Vec<_>>(),
    )
    .unwrap()
    .lazy()
    .with_column(col(COL_DEP_DATETIME).cast(DataType::Datetime(TimeUnit::Milliseconds, None)))
    .collect()
    .unwrap();
    DatasetLoader::from_frame(frame).unwrap()
}

fn subset(all: &'static [&'static str]) -> impl Strategy<Value = Option<BTreeSet<String>>> {
    prop::option::of(prop::sample::subsequence(all.to_vec(), 0..=all.len()))
        .prop_map(|values| values.map(|v| v.into_iter().map(str::to_string).collect()))
}

fn unit() -> impl Strategy<Value = SegmentationUnit> {
    prop_oneof![
        Just(SegmentationUnit::Day),
        Just(SegmentationUnit::Week),
        Just(SegmentationUnit::Month),
        Just(SegmentationUnit::Year),
    ]
}

fn filter_spec() -> impl Strategy<Value = FilterSpec> {
    (
        subset(&SUBTYPES),
        subset(&REGISTRATIONS),
        prop::option::of(prop::sample::subsequence(CODES.to_vec(), 0..=4)),
        prop::option::of(0u32..120),
        prop::option::of(0u32..120),
        prop::option::of(0u32..5),
        unit(),
    )
        .prop_map(|(subtypes, registrations, codes, start, end, width, unit)| FilterSpec {
            subtypes,
            registrations,
            delay_codes: codes.map(|c| c.into_iter().collect()),
            date_start: start.map(|d| base_day() + chrono::Duration::days(d as i64)),
            date_end: end.map(|d| base_day() + chrono::Duration::days(d as i64)),
            segmentation_width: width,
            segmentation_unit: unit,
        })
}

// ==================== Helpers ====================

type RowKey = (Option<i64>, Option<i32>, Option<i64>, Option<String>, Option<String>);

fn row_keys(df: &DataFrame) -> Vec<RowKey> {
    let stamps: Vec<Option<i64>> = column_datetimes(df, COL_DEP_DATETIME)
        .unwrap()
        .into_iter()
        .map(|dt| dt.map(|dt| dt.and_utc().timestamp_millis()))
        .collect();
    let codes = column_i32(df, COL_DELAY_CODE).unwrap();
    let minutes = column_i64(df, COL_DELAY_MINUTES).unwrap();
    let subtypes = column_strings(df, COL_SUBTYPE).unwrap();
    let registrations = column_strings(df, COL_REGISTRATION).unwrap();
    stamps
        .into_iter()
        .zip(codes)
        .zip(minutes)
        .zip(subtypes)
        .zip(registrations)
        .map(|((((s, c), m), t), r)| (s, c, m, t, r))
        .collect()
}

fn assert_group_sums<K: std::hash::Hash + Eq>(shares: impl IntoIterator<Item = (K, f64)>) {
    let mut sums: HashMap<K, f64> = HashMap::new();
    for (key, pct) in shares {
        *sums.entry(key).or_default() += pct;
    }
    for sum in sums.values() {
        assert!(*sum <= 100.01, "group share sums to {}", sum);
    }
}

// ==================== Properties ====================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_active_is_subset_of_unfiltered(
        flights in prop::collection::vec(flight(), 0..60),
        spec in filter_spec(),
    ) {
        let data = dataset(&flights);
        let outcome = apply_filter(&data.raw, &data.unfiltered, &spec).unwrap();
        let active = outcome.active.collect().unwrap();
        let unfiltered = data.unfiltered.clone().collect().unwrap();

        let mut available: HashMap<RowKey, usize> = HashMap::new();
        for key in row_keys(&unfiltered) {
            *available.entry(key).or_default() += 1;
        }
        for key in row_keys(&active) {
            let left = available.get_mut(&key);
            prop_assert!(left.as_ref().is_some_and(|n| **n > 0), "row {:?} not in unfiltered", key);
            if let Some(n) = left {
                *n -= 1;
            }
        }
    }

    #[test]
    fn prop_windows_contain_departure(
        flights in prop::collection::vec(flight(), 1..60),
        spec in filter_spec(),
        width in 1u32..4,
        unit in unit(),
    ) {
        let spec = spec.with_segmentation(width, unit);
        let data = dataset(&flights);
        let active = apply_filter(&data.raw, &data.unfiltered, &spec)
            .unwrap()
            .active
            .collect()
            .unwrap();

        let departures = column_datetimes(&active, COL_DEP_DATETIME).unwrap();
        let starts = column_dates(&active, COL_WINDOW_START).unwrap();
        let ends = column_dates(&active, COL_WINDOW_END).unwrap();
        for ((departure, start), end) in departures.into_iter().zip(starts).zip(ends) {
            let day = departure.unwrap().date();
            prop_assert!(start.unwrap() <= day && day <= end.unwrap());
        }
    }

    #[test]
    fn prop_group_percentages_bounded(
        flights in prop::collection::vec(flight(), 0..80),
        spec in filter_spec(),
    ) {
        let data = dataset(&flights);
        let outcome = apply_filter(&data.raw, &data.unfiltered, &spec).unwrap();
        let active = &outcome.active;

        assert_group_sums(
            services::period_distribution(active).unwrap()
                .into_iter()
                .map(|r| ((), r.percentage_of_total)),
        );
        assert_group_sums(
            services::family_by_period(active).unwrap()
                .into_iter()
                .map(|r| (r.window_start, r.percentage_of_period)),
        );
        assert_group_sums(
            services::code_by_family_by_period(active).unwrap()
                .into_iter()
                .map(|r| ((r.window_start, r.family), r.percentage_of_family)),
        );
        assert_group_sums(
            services::subtype_by_period(active).unwrap()
                .into_iter()
                .map(|r| ((r.window_start, r.subtype), r.percentage_of_subtype)),
        );
        assert_group_sums(
            services::registration_by_period(active).unwrap()
                .into_iter()
                .map(|r| ((r.window_start, r.registration), r.percentage_of_registration)),
        );
        assert_group_sums(
            services::subtype_share(active).unwrap()
                .into_iter()
                .map(|r| (r.window_start, r.percentage_of_period)),
        );
        assert_group_sums(
            services::subtype_by_airport(active).unwrap()
                .into_iter()
                .map(|r| ((r.window_start, r.airport), r.percentage_of_airport)),
        );
        assert_group_sums(
            services::delay_category_by_period(active).unwrap()
                .into_iter()
                .map(|r| (r.window_start, r.percentage_of_period)),
        );
        for row in services::weekly_pivot(active).unwrap() {
            prop_assert!(row.day_pct.iter().sum::<f64>() <= 100.01);
        }
    }

    #[test]
    fn prop_fingerprint_ignores_segmentation(
        spec in filter_spec(),
        width in 0u32..30,
        unit in unit(),
    ) {
        prop_assert_eq!(spec.fingerprint(), spec.with_segmentation(width, unit).fingerprint());
    }

    #[test]
    fn prop_fingerprint_ignores_empty_fields(spec in filter_spec()) {
        let mut emptied = spec.clone();
        if emptied.subtypes.is_none() {
            emptied.subtypes = Some(BTreeSet::new());
        }
        if emptied.registrations.is_none() {
            emptied.registrations = Some(BTreeSet::new());
        }
        if emptied.delay_codes.is_none() {
            emptied.delay_codes = Some(BTreeSet::new());
        }
        prop_assert_eq!(spec.fingerprint(), emptied.fingerprint());
    }

    #[test]
    fn prop_filter_is_deterministic(
        flights in prop::collection::vec(flight(), 0..60),
        spec in filter_spec(),
    ) {
        let data = dataset(&flights);
        let first = apply_filter(&data.raw, &data.unfiltered, &spec).unwrap();
        let second = apply_filter(&data.raw, &data.unfiltered, &spec).unwrap();
        prop_assert!(first.active.collect().unwrap().equals_missing(&second.active.collect().unwrap()));
        prop_assert!(first.totals.collect().unwrap().equals_missing(&second.totals.collect().unwrap()));
    }

    #[test]
    fn prop_cache_hit_matches_miss(
        flights in prop::collection::vec(flight(), 0..60),
        spec in filter_spec(),
    ) {
        let data = dataset(&flights);
        let active = apply_filter(&data.raw, &data.unfiltered, &spec).unwrap().active;
        let cache = ComputationCache::in_memory(Duration::from_secs(60));
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let fingerprint = spec.fingerprint();

        let (miss, hit) = runtime.block_on(async {
            let miss = cache
                .memoize(&fingerprint, "weekly_pivot", None, || async {
                    Ok(services::weekly_pivot(&active)?)
                })
                .await
                .unwrap();
            let hit = cache
                .memoize(&fingerprint, "weekly_pivot", None, || async {
                    Err::<Vec<services::WeeklyPivotRow>, _>(DashboardError::InternalError(
                        "not recomputed".to_string(),
                    ))
                })
                .await
                .unwrap();
            (miss, hit)
        });
        prop_assert_eq!(
            serde_json::to_vec(&miss).unwrap(),
            serde_json::to_vec(&hit).unwrap()
        );
    }

    #[test]
    fn prop_active_has_technical_nonzero_delays_only(
        flights in prop::collection::vec(flight(), 0..60),
        spec in filter_spec(),
    ) {
        let data = dataset(&flights);
        let active = apply_filter(&data.raw, &data.unfiltered, &spec)
            .unwrap()
            .active
            .collect()
            .unwrap();
        for minutes in column_i64(&active, COL_DELAY_MINUTES).unwrap() {
            prop_assert_ne!(minutes, Some(0));
        }
        for code in column_i32(&active, COL_DELAY_CODE).unwrap() {
            prop_assert!(code.is_some_and(|c| TECHNICAL_DELAY_CODES.contains(&c)));
        }
    }
}

#[test]
fn test_empty_unfiltered_yields_empty_aggregates() {
    // Only foreign registrations and zero delays: both views empty
    let flights = vec![
        Flight { day: 1, minute_of_day: 60, code: 41, minutes: 0, subtype: 0, registration: 0, airport: 0 },
        Flight { day: 2, minute_of_day: 60, code: 41, minutes: 30, subtype: 0, registration: 3, airport: 0 },
    ];
    let data = dataset(&flights);
    assert_eq!(data.unfiltered_rows, 0);

    let spec = FilterSpec::default().with_segmentation(1, SegmentationUnit::Week);
    let outcome = apply_filter(&data.raw, &data.unfiltered, &spec).unwrap();
    let active = &outcome.active;

    assert!(services::code_summary(active).unwrap().is_empty());
    assert!(services::period_distribution(active).unwrap().is_empty());
    assert!(services::family_by_period(active).unwrap().is_empty());
    assert!(services::code_by_family_by_period(active).unwrap().is_empty());
    assert!(services::subtype_by_period(active).unwrap().is_empty());
    assert!(services::registration_by_period(active).unwrap().is_empty());
    assert!(services::subtype_share(active).unwrap().is_empty());
    assert!(services::subtype_by_registration(active).unwrap().is_empty());
    assert!(services::subtype_by_airport(active).unwrap().is_empty());
    assert!(services::delay_category_by_period(active).unwrap().is_empty());
    assert!(services::weekly_pivot(active).unwrap().is_empty());
    assert_eq!(services::flight_summary(active).unwrap().flight_count, 0);

    // The carrier's raw flight still counts towards the totals
    let kpis = services::performance_kpis(active, &outcome.totals).unwrap();
    assert_eq!(kpis.len(), 1);
    assert_eq!(kpis[0].total_count, 1);
    assert_eq!(kpis[0].per_flights_not_delayed, 100.0);

    let schema = outcome.active.clone().collect_schema().unwrap();
    assert!(schema.contains(COL_WINDOW_START));
    assert!(schema.contains(COL_WINDOW_END));
}
