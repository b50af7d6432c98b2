//! Reactive orchestration of the dataset views.
//!
//! [`Dashboard`] ties the workbook source, the [`DatasetRegistry`], the
//! [`ComputationCache`] and the [`EventBus`] together. It is the only writer of
//! the registry: source reloads, path loss and filter submissions are
//! serialised behind one async lock, and every write is announced on the bus
//! (`DataChanged` always precedes the `FilterChanged` it triggers).
//!
//! Aggregates are read through [`Dashboard::compute`], which memoises results
//! under the fingerprint of the filter that produced the current `active`.

use chrono::NaiveDate;
use log::{debug, info, warn};
use parking_lot::RwLock;
use polars::prelude::PolarsResult;
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

use crate::cache::ComputationCache;
use crate::config::ConfigStore;
use crate::core::{DashboardError, DashboardResult, DataStatus, LoadError};
use crate::events::{DashboardEvent, EventBus};
use crate::io::{DatasetLoader, LoadedDataset, SourceIdentity, WorkbookSource};
use crate::models::{Dimension, FilterForm, FilterSpec, SubmitState};
use crate::registry::{DatasetRegistry, DatasetSnapshot, DerivedViews};
use crate::services::{
    self, CodeByFamilyByPeriodRow, CodeSummaryRow, DelayCategoryByPeriodRow, FamilyByPeriodRow,
    FlightSummary, PerformanceKpiRow, PeriodDistributionRow, RegistrationByPeriodRow,
    SubtypeByAirportRow, SubtypeByPeriodRow, SubtypeByRegistrationRow, SubtypeShareRow,
    WeeklyPivotRow,
};
use crate::transformations;

/// Cache prefixes, one per aggregate.
pub mod prefixes {
    pub const CODE_SUMMARY: &str = "code_summary";
    pub const PERIOD_DISTRIBUTION: &str = "period_distribution";
    pub const FAMILY_BY_PERIOD: &str = "family_by_period";
    pub const CODE_BY_FAMILY_BY_PERIOD: &str = "code_by_family_by_period";
    pub const SUBTYPE_BY_PERIOD: &str = "subtype_by_period";
    pub const REGISTRATION_BY_PERIOD: &str = "registration_by_period";
    pub const SUBTYPE_SHARE: &str = "subtype_share";
    pub const SUBTYPE_BY_REGISTRATION: &str = "subtype_by_registration";
    pub const SUBTYPE_BY_AIRPORT: &str = "subtype_by_airport";
    pub const DELAY_CATEGORY_BY_PERIOD: &str = "delay_category_by_period";
    pub const PERFORMANCE_KPIS: &str = "performance_kpis";
    pub const WEEKLY_PIVOT: &str = "weekly_pivot";
    pub const FLIGHT_SUMMARY: &str = "flight_summary";
}

fn join_error(err: tokio::task::JoinError) -> DashboardError {
    DashboardError::InternalError(format!("background task failed: {}", err))
}

/// Shared application state.
pub struct Dashboard {
    config: Arc<ConfigStore>,
    source: Arc<WorkbookSource>,
    registry: DatasetRegistry,
    cache: Arc<ComputationCache>,
    events: EventBus,
    filter: RwLock<FilterSpec>,
    status: RwLock<DataStatus>,
    writer: Mutex<()>,
    watcher_running: AtomicBool,
}

impl Dashboard {
    pub fn new(config: Arc<ConfigStore>, cache: Arc<ComputationCache>) -> Self {
        let source = Arc::new(WorkbookSource::new(Arc::clone(&config)));
        Self {
            config,
            source,
            registry: DatasetRegistry::new(),
            cache,
            events: EventBus::default(),
            filter: RwLock::new(FilterSpec::default()),
            status: RwLock::new(DataStatus::Unselected),
            writer: Mutex::new(()),
            watcher_running: AtomicBool::new(false),
        }
    }

    /// Load configuration from `base_path` and connect the cache it names.
    pub async fn from_config_path<P: AsRef<Path>>(base_path: P) -> DashboardResult<Self> {
        let config = Arc::new(ConfigStore::load(base_path)?);
        let cache = Arc::new(ComputationCache::from_config(config.base()).await);
        Ok(Self::new(config, cache))
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    pub fn source(&self) -> &Arc<WorkbookSource> {
        &self.source
    }

    pub fn registry(&self) -> &DatasetRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<ComputationCache> {
        &self.cache
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.events.subscribe()
    }

    pub fn data_status(&self) -> DataStatus {
        *self.status.read()
    }

    /// The filter behind the current `active` view.
    pub fn active_filter(&self) -> FilterSpec {
        self.filter.read().clone()
    }

    /// A coherent view of `raw`, `unfiltered`, `active` and `totals`.
    pub fn dataset_handles(&self) -> Arc<DatasetSnapshot> {
        self.registry.snapshot()
    }

    /// Claim the single watcher slot of this dashboard.
    pub(crate) fn claim_watcher(&self) -> bool {
        self.watcher_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn release_watcher(&self) {
        self.watcher_running.store(false, Ordering::SeqCst);
    }

    fn set_status(&self, status: DataStatus) {
        let changed = {
            let mut current = self.status.write();
            let changed = *current != status;
            *current = status;
            changed
        };
        if changed {
            info!("Data status: {}", status);
            self.events.publish(DashboardEvent::DataStatusChanged(status));
        }
    }

    /// Replace `raw`/`unfiltered` with the workbook at `identity.path` and
    /// re-apply the current filter.
    ///
    /// On failure nothing is published and the previous views stay in place.
    pub async fn reload_source(&self, identity: SourceIdentity) -> DashboardResult<u64> {
        let _writer = self.writer.lock().await;

        let path = identity.path.clone();
        let loaded = tokio::task::spawn_blocking(move || {
            let dataset = DatasetLoader::load(&path)?;
            let range = transformations::date_range(&dataset.raw).map_err(LoadError::from)?;
            Ok::<_, LoadError>((dataset, range))
        })
        .await
        .map_err(join_error)?;

        let (dataset, range) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!("Failed to load '{}': {}", identity.path.display(), e);
                return Err(DashboardError::LoadFailed(e));
            }
        };

        self.install_source(dataset, Some(identity), range).await
    }

    // Callers hold `writer`. The cache is cleared after the swap; `compute`
    // captures the cache generation before it snapshots the registry.
    async fn install_source(
        &self,
        dataset: LoadedDataset,
        identity: Option<SourceIdentity>,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> DashboardResult<u64> {
        let generation = self.registry.replace_source(dataset, identity.clone(), range);
        self.cache.clear().await;

        if let Some(identity) = identity {
            let modified = identity.modified_label();
            if let Err(e) = self.config.update_user(|user| {
                user.modification_date = Some(modified);
            }) {
                warn!("Could not persist modification date: {}", e);
            }
        }

        self.set_status(DataStatus::Selected);
        self.events.publish(DashboardEvent::DataChanged { generation });

        let spec = self.active_filter();
        self.refilter(spec).await?;
        Ok(generation)
    }

    /// Drop every view after the workbook disappeared. Returns `false` when no
    /// workbook was selected, so repeated ticks stay quiet.
    pub async fn handle_path_lost(&self) -> bool {
        let _writer = self.writer.lock().await;
        if self.data_status() != DataStatus::Selected {
            return false;
        }

        let lost = self
            .registry
            .snapshot()
            .source
            .as_ref()
            .map(|source| source.path.clone())
            .unwrap_or_default();
        warn!("{}", DashboardError::PathLost(lost));

        self.source.clear_cached_path();
        let generation = self.registry.clear();
        self.cache.clear().await;
        self.set_status(DataStatus::Unselected);
        self.events.publish(DashboardEvent::DataChanged { generation });
        true
    }

    /// Make `spec` the active filter. Returns its fingerprint.
    pub async fn submit_filter(&self, spec: FilterSpec) -> DashboardResult<String> {
        let _writer = self.writer.lock().await;
        self.refilter(spec).await
    }

    /// Validate a raw form and submit it. An invalid form leaves the active
    /// filter untouched.
    pub async fn submit_form(&self, form: FilterForm) -> DashboardResult<String> {
        let spec = FilterSpec::try_from(form)?;
        self.submit_filter(spec).await
    }

    /// Whether `candidate` differs from the active filter.
    pub fn submit_state(&self, candidate: &FilterSpec) -> SubmitState {
        SubmitState::compare(candidate, &self.filter.read())
    }

    // Callers hold `writer`.
    async fn refilter(&self, spec: FilterSpec) -> DashboardResult<String> {
        let fingerprint = spec.fingerprint();
        let snapshot = self.registry.snapshot();

        if let (Some(raw), Some(unfiltered)) = (snapshot.raw.clone(), snapshot.unfiltered.clone()) {
            let task_spec = spec.clone();
            let outcome = tokio::task::spawn_blocking(move || {
                transformations::apply_filter(&raw, &unfiltered, &task_spec)
            })
            .await
            .map_err(join_error)??;

            debug!(
                "Filter {} effective bounds {:?}..{:?}",
                fingerprint, outcome.effective_start, outcome.effective_end
            );
            let derived = DerivedViews {
                active: outcome.active,
                totals: outcome.totals,
                spec: spec.clone(),
            };
            if !self.registry.replace_derived(snapshot.generation, derived) {
                return Err(DashboardError::InternalError(
                    "dataset replaced while filtering".to_string(),
                ));
            }
        }

        *self.filter.write() = spec;
        self.events.publish(DashboardEvent::FilterChanged {
            fingerprint: fingerprint.clone(),
        });
        Ok(fingerprint)
    }

    /// Values of `dimension` still reachable under the other filters of
    /// `candidate` (or of the active filter).
    pub async fn list_dimension_values(
        &self,
        dimension: Dimension,
        candidate: Option<&FilterSpec>,
    ) -> DashboardResult<Vec<String>> {
        let Some(unfiltered) = self.registry.get_unfiltered() else {
            return Ok(Vec::new());
        };
        let spec = candidate.cloned().unwrap_or_else(|| self.active_filter());
        let values = tokio::task::spawn_blocking(move || {
            transformations::list_dimension_values(&unfiltered, &spec, dimension)
        })
        .await
        .map_err(join_error)??;
        Ok(values)
    }

    /// Flip and persist the auto-refresh preference. Returns the new value.
    pub fn toggle_auto_refresh(&self) -> DashboardResult<bool> {
        let user = self.config.update_user(|user| {
            user.auto_refresh = !user.auto_refresh;
        })?;
        info!("Auto-refresh {}", if user.auto_refresh { "enabled" } else { "disabled" });
        Ok(user.auto_refresh)
    }

    pub fn auto_refresh(&self) -> bool {
        self.config.user().auto_refresh
    }

    /// Point the dashboard at another workbook. The watcher picks it up on
    /// its next tick.
    pub fn set_workbook_path(&self, path: &Path) -> DashboardResult<()> {
        self.source.set_path(path).map_err(DashboardError::ConfigMissing)
    }

    /// Memoised aggregate over the current derived views.
    ///
    /// `windowed` aggregates depend on the segmentation, which the filter
    /// fingerprint leaves out, so it is folded into the key prefix. With no
    /// dataset loaded the aggregate is `T::default()`.
    pub async fn compute<T, F>(&self, prefix: &str, windowed: bool, calculate: F) -> DashboardResult<T>
    where
        T: Serialize + DeserializeOwned + Default + Send + 'static,
        F: FnOnce(&DerivedViews) -> PolarsResult<T> + Send + 'static,
    {
        let cache_generation = self.cache.generation();
        let Some(derived) = self.registry.snapshot().derived.clone() else {
            return Ok(T::default());
        };
        let fingerprint = derived.spec.fingerprint();
        let prefix = if windowed {
            let every = derived
                .spec
                .segmentation()
                .map(|segmentation| segmentation.every())
                .unwrap_or_else(|| "all".to_string());
            format!("{}:{}", prefix, every)
        } else {
            prefix.to_string()
        };

        self.cache
            .memoize_since(cache_generation, &fingerprint, &prefix, None, move || async move {
                let value = tokio::task::spawn_blocking(move || calculate(&derived))
                    .await
                    .map_err(join_error)??;
                Ok(value)
            })
            .await
    }

    pub async fn code_summary(&self) -> DashboardResult<Vec<CodeSummaryRow>> {
        self.compute(prefixes::CODE_SUMMARY, false, |views| {
            services::code_summary(&views.active)
        })
        .await
    }

    pub async fn period_distribution(&self) -> DashboardResult<Vec<PeriodDistributionRow>> {
        self.compute(prefixes::PERIOD_DISTRIBUTION, true, |views| {
            services::period_distribution(&views.active)
        })
        .await
    }

    pub async fn family_by_period(&self) -> DashboardResult<Vec<FamilyByPeriodRow>> {
        self.compute(prefixes::FAMILY_BY_PERIOD, true, |views| {
            services::family_by_period(&views.active)
        })
        .await
    }

    pub async fn code_by_family_by_period(&self) -> DashboardResult<Vec<CodeByFamilyByPeriodRow>> {
        self.compute(prefixes::CODE_BY_FAMILY_BY_PERIOD, true, |views| {
            services::code_by_family_by_period(&views.active)
        })
        .await
    }

    pub async fn subtype_by_period(&self) -> DashboardResult<Vec<SubtypeByPeriodRow>> {
        self.compute(prefixes::SUBTYPE_BY_PERIOD, true, |views| {
            services::subtype_by_period(&views.active)
        })
        .await
    }

    pub async fn registration_by_period(&self) -> DashboardResult<Vec<RegistrationByPeriodRow>> {
        self.compute(prefixes::REGISTRATION_BY_PERIOD, true, |views| {
            services::registration_by_period(&views.active)
        })
        .await
    }

    pub async fn subtype_share(&self) -> DashboardResult<Vec<SubtypeShareRow>> {
        self.compute(prefixes::SUBTYPE_SHARE, true, |views| {
            services::subtype_share(&views.active)
        })
        .await
    }

    pub async fn subtype_by_registration(&self) -> DashboardResult<Vec<SubtypeByRegistrationRow>> {
        self.compute(prefixes::SUBTYPE_BY_REGISTRATION, true, |views| {
            services::subtype_by_registration(&views.active)
        })
        .await
    }

    pub async fn subtype_by_airport(&self) -> DashboardResult<Vec<SubtypeByAirportRow>> {
        self.compute(prefixes::SUBTYPE_BY_AIRPORT, true, |views| {
            services::subtype_by_airport(&views.active)
        })
        .await
    }

    pub async fn delay_category_by_period(&self) -> DashboardResult<Vec<DelayCategoryByPeriodRow>> {
        self.compute(prefixes::DELAY_CATEGORY_BY_PERIOD, true, |views| {
            services::delay_category_by_period(&views.active)
        })
        .await
    }

    pub async fn performance_kpis(&self) -> DashboardResult<Vec<PerformanceKpiRow>> {
        self.compute(prefixes::PERFORMANCE_KPIS, true, |views| {
            services::performance_kpis(&views.active, &views.totals)
        })
        .await
    }

    pub async fn weekly_pivot(&self) -> DashboardResult<Vec<WeeklyPivotRow>> {
        self.compute(prefixes::WEEKLY_PIVOT, false, |views| {
            services::weekly_pivot(&views.active)
        })
        .await
    }

    pub async fn flight_summary(&self) -> DashboardResult<FlightSummary> {
        self.compute(prefixes::FLIGHT_SUMMARY, false, |views| {
            services::flight_summary(&views.active)
        })
        .await
    }

    /// File stem for exports of the current view.
    pub fn export_name(&self) -> String {
        self.filter.read().export_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, CacheStore, MemoryStore};
    use crate::core::domain::*;
    use crate::models::{Dimension, SegmentationUnit};
    use async_trait::async_trait;
    use polars::prelude::{col, DataType, IntoLazy, TimeUnit};
    use std::time::Duration;
    use tokio::sync::{oneshot, Notify};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dashboard(dir: &Path) -> Dashboard {
        let base = dir.join("config.toml");
        std::fs::write(
            &base,
            format!("dir_path = {:?}\n", dir.join("data").display().to_string()),
        )
        .unwrap();
        let config = Arc::new(ConfigStore::load_with_user_dir(&base, dir.join("user")).unwrap());
        Dashboard::new(config, Arc::new(ComputationCache::in_memory(Duration::from_secs(60))))
    }

    fn dataset() -> LoadedDataset {
        dataset_with_codes([41, 43, 46])
    }

    fn dataset_with_codes(codes: [i32; 3]) -> LoadedDataset {
        let stamps: Vec<i64> = [date(2024, 1, 1), date(2024, 1, 2), date(2024, 1, 9)]
            .iter()
            .map(|d| d.and_hms_opt(8, 0, 0).unwrap().and_utc().timestamp_millis())
            .collect();
        let frame = polars::df!(
            COL_DEP_DATETIME => stamps,
            COL_DELAY_CODE => &codes,
            COL_DELAY_MINUTES => &[10i64, 20, 30],
            COL_SUBTYPE => &["321", "738", "321"],
            COL_REGISTRATION => &["CN-ROA", "CN-ROB", "CN-ROA"],
            COL_DEP_AIRPORT => &["CMN", "RAK", "CMN"],
            COL_FAMILY => &["TECH", "TECH", "TECH"],
            COL_CODE_DESCRIPTION => &["a", "b", "c"],
        )
        .unwrap()
        .lazy()
        .with_column(col(COL_DEP_DATETIME).cast(DataType::Datetime(TimeUnit::Milliseconds, None)))
        .collect()
        .unwrap();
        DatasetLoader::from_frame(frame).unwrap()
    }

    async fn seed(dashboard: &Dashboard) {
        let generation = dashboard.registry.replace_source(
            dataset(),
            None,
            Some((date(2024, 1, 1), date(2024, 1, 9))),
        );
        let _writer = dashboard.writer.lock().await;
        assert_eq!(dashboard.registry.generation(), generation);
        dashboard.refilter(FilterSpec::default()).await.unwrap();
    }

    #[tokio::test]
    async fn test_compute_without_data_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let dashboard = dashboard(dir.path());
        assert!(dashboard.code_summary().await.unwrap().is_empty());
        assert_eq!(dashboard.flight_summary().await.unwrap(), FlightSummary::default());
    }

    #[tokio::test]
    async fn test_submit_filter_publishes_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let dashboard = dashboard(dir.path());
        seed(&dashboard).await;
        let mut events = dashboard.subscribe();

        let spec = FilterSpec {
            subtypes: Some(["321".to_string()].into_iter().collect()),
            ..Default::default()
        };
        let fingerprint = dashboard.submit_filter(spec.clone()).await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            DashboardEvent::FilterChanged { fingerprint: fingerprint.clone() }
        );
        assert_eq!(dashboard.active_filter(), spec);
        assert_eq!(dashboard.submit_state(&spec), SubmitState::Synced);

        let summary = dashboard.flight_summary().await.unwrap();
        assert_eq!(summary.flight_count, 2);
    }

    #[tokio::test]
    async fn test_invalid_form_keeps_active_filter() {
        let dir = tempfile::tempdir().unwrap();
        let dashboard = dashboard(dir.path());
        seed(&dashboard).await;
        let before = dashboard.active_filter();

        let form = FilterForm {
            segmentation_unit: Some("fortnight".to_string()),
            segmentation_width: Some(serde_json::json!(1)),
            ..Default::default()
        };
        let err = dashboard.submit_form(form).await.unwrap_err();
        assert!(matches!(err, DashboardError::InvalidFilterSpec(_)));
        assert_eq!(dashboard.active_filter(), before);
    }

    #[tokio::test]
    async fn test_windowed_results_keyed_by_segmentation() {
        let dir = tempfile::tempdir().unwrap();
        let dashboard = dashboard(dir.path());
        seed(&dashboard).await;

        let unsegmented = dashboard.period_distribution().await.unwrap();
        assert_eq!(unsegmented.len(), 1);

        let weekly = FilterSpec::default().with_segmentation(1, SegmentationUnit::Week);
        dashboard.submit_filter(weekly).await.unwrap();
        let segmented = dashboard.period_distribution().await.unwrap();
        assert_eq!(segmented.len(), 2);
    }

    #[tokio::test]
    async fn test_fleet_shares_follow_resegmentation() {
        let dir = tempfile::tempdir().unwrap();
        let dashboard = dashboard(dir.path());
        seed(&dashboard).await;

        let unsegmented = dashboard.subtype_by_airport().await.unwrap();
        assert!(unsegmented
            .iter()
            .all(|row| (row.window_start, row.window_end) == (date(2024, 1, 1), date(2024, 1, 9))));
        assert!(!dashboard.subtype_by_registration().await.unwrap().is_empty());

        let weekly = FilterSpec::default().with_segmentation(1, SegmentationUnit::Week);
        dashboard.submit_filter(weekly).await.unwrap();
        let active = dashboard.registry().get_active().unwrap();

        let by_airport = dashboard.subtype_by_airport().await.unwrap();
        assert_eq!(by_airport, services::subtype_by_airport(&active).unwrap());
        assert_ne!(by_airport, unsegmented);

        let by_registration = dashboard.subtype_by_registration().await.unwrap();
        assert_eq!(by_registration, services::subtype_by_registration(&active).unwrap());
    }

    /// Memory store whose first `get` waits until released.
    struct GatedStore {
        inner: MemoryStore,
        entered: Notify,
        gate: parking_lot::Mutex<Option<oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl CacheStore for GatedStore {
        fn name(&self) -> &'static str {
            "gated"
        }

        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            let gate = self.gate.lock().take();
            if let Some(gate) = gate {
                self.entered.notify_one();
                let _ = gate.await;
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), CacheError> {
            self.inner.set(key, value, ttl).await
        }

        async fn delete_prefix(&self, prefix: &str) -> Result<bool, CacheError> {
            self.inner.delete_prefix(prefix).await
        }
    }

    #[tokio::test]
    async fn test_reader_of_replaced_source_does_not_poison_cache() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("config.toml");
        std::fs::write(&base, "dir_path = \"unused\"\n").unwrap();
        let config = Arc::new(ConfigStore::load_with_user_dir(&base, dir.path().join("user")).unwrap());

        let (release, gate) = oneshot::channel();
        let store = Arc::new(GatedStore {
            inner: MemoryStore::new(),
            entered: Notify::new(),
            gate: parking_lot::Mutex::new(Some(gate)),
        });
        let cache = Arc::new(ComputationCache::with_store(store.clone(), Duration::from_secs(60)));
        let dashboard = Arc::new(Dashboard::new(config, cache));
        let range = Some((date(2024, 1, 1), date(2024, 1, 9)));

        {
            let _writer = dashboard.writer.lock().await;
            dashboard
                .install_source(dataset_with_codes([41, 41, 41]), None, range)
                .await
                .unwrap();
        }

        // Snapshot the first source, then stall inside the cache lookup
        let reader = Arc::clone(&dashboard);
        let in_flight = tokio::spawn(async move { reader.code_summary().await });
        store.entered.notified().await;

        {
            let _writer = dashboard.writer.lock().await;
            dashboard
                .install_source(dataset_with_codes([46, 46, 46]), None, range)
                .await
                .unwrap();
        }
        release.send(()).unwrap();
        let stale = in_flight.await.unwrap().unwrap();
        assert_eq!(stale[0].delay_code, 41);

        dashboard.submit_filter(FilterSpec::default()).await.unwrap();
        let fresh = dashboard.code_summary().await.unwrap();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].delay_code, 46);
        assert_eq!(fresh[0].occurrences, 3);
    }

    #[tokio::test]
    async fn test_dimension_values_follow_other_filters() {
        let dir = tempfile::tempdir().unwrap();
        let dashboard = dashboard(dir.path());
        seed(&dashboard).await;

        let candidate = FilterSpec {
            subtypes: Some(["738".to_string()].into_iter().collect()),
            ..Default::default()
        };
        let registrations = dashboard
            .list_dimension_values(Dimension::Registrations, Some(&candidate))
            .await
            .unwrap();
        assert_eq!(registrations, vec!["CN-ROB".to_string()]);

        let subtypes = dashboard
            .list_dimension_values(Dimension::Subtypes, Some(&candidate))
            .await
            .unwrap();
        assert_eq!(subtypes, vec!["321".to_string(), "738".to_string()]);
    }

    #[tokio::test]
    async fn test_path_lost_only_once() {
        let dir = tempfile::tempdir().unwrap();
        let dashboard = dashboard(dir.path());
        seed(&dashboard).await;
        dashboard.set_status(DataStatus::Selected);
        let mut events = dashboard.subscribe();

        assert!(dashboard.handle_path_lost().await);
        assert!(!dashboard.handle_path_lost().await);
        assert_eq!(
            events.recv().await.unwrap(),
            DashboardEvent::DataStatusChanged(DataStatus::Unselected)
        );
        assert!(matches!(events.recv().await.unwrap(), DashboardEvent::DataChanged { .. }));
        assert!(dashboard.dataset_handles().raw.is_none());
        assert!(dashboard.code_summary().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_auto_refresh_persists() {
        let dir = tempfile::tempdir().unwrap();
        let dashboard = dashboard(dir.path());
        let initial = dashboard.auto_refresh();
        assert_eq!(dashboard.toggle_auto_refresh().unwrap(), !initial);
        assert_eq!(dashboard.config().user().auto_refresh, !initial);
    }
}
