//! Process-wide holder of the dataset views.
//!
//! The registry publishes immutable [`DatasetSnapshot`]s. A writer builds the
//! next snapshot off-lock and swaps it in; readers clone the current `Arc` and
//! keep a coherent tuple for as long as they need it.

use chrono::NaiveDate;
use log::{debug, info};
use parking_lot::RwLock;
use polars::prelude::LazyFrame;
use std::sync::Arc;

use crate::io::{LoadedDataset, SourceIdentity};
use crate::models::FilterSpec;

/// `active` and `totals` together with the filter that produced them.
#[derive(Clone)]
pub struct DerivedViews {
    pub active: LazyFrame,
    pub totals: LazyFrame,
    pub spec: FilterSpec,
}

/// One coherent generation of the dataset views.
#[derive(Clone, Default)]
pub struct DatasetSnapshot {
    /// Bumped on every source replacement or clear
    pub generation: u64,
    pub source: Option<SourceIdentity>,
    pub raw: Option<LazyFrame>,
    pub unfiltered: Option<LazyFrame>,
    pub raw_date_range: Option<(NaiveDate, NaiveDate)>,
    pub derived: Option<DerivedViews>,
}

impl DatasetSnapshot {
    pub fn has_source(&self) -> bool {
        self.raw.is_some()
    }
}

impl std::fmt::Debug for DatasetSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetSnapshot")
            .field("generation", &self.generation)
            .field("source", &self.source)
            .field("raw_date_range", &self.raw_date_range)
            .field("has_derived", &self.derived.is_some())
            .finish()
    }
}

/// Single-writer registry of `raw`, `unfiltered`, `active` and `totals`.
#[derive(Default)]
pub struct DatasetRegistry {
    current: RwLock<Arc<DatasetSnapshot>>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot; cheap to clone and safe to hold across awaits.
    pub fn snapshot(&self) -> Arc<DatasetSnapshot> {
        self.current.read().clone()
    }

    pub fn generation(&self) -> u64 {
        self.current.read().generation
    }

    pub fn get_unfiltered(&self) -> Option<LazyFrame> {
        self.snapshot().unfiltered.clone()
    }

    pub fn get_raw(&self) -> Option<LazyFrame> {
        self.snapshot().raw.clone()
    }

    pub fn get_active(&self) -> Option<LazyFrame> {
        self.snapshot().derived.as_ref().map(|d| d.active.clone())
    }

    pub fn get_totals(&self) -> Option<LazyFrame> {
        self.snapshot().derived.as_ref().map(|d| d.totals.clone())
    }

    pub fn get_raw_min_max_date(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.snapshot().raw_date_range
    }

    /// Publish a freshly loaded source. Derived views are dropped so that
    /// nothing filtered from the previous source survives the swap.
    pub fn replace_source(
        &self,
        dataset: LoadedDataset,
        source: Option<SourceIdentity>,
        raw_date_range: Option<(NaiveDate, NaiveDate)>,
    ) -> u64 {
        let mut current = self.current.write();
        let generation = current.generation + 1;
        *current = Arc::new(DatasetSnapshot {
            generation,
            source,
            raw: Some(dataset.raw),
            unfiltered: Some(dataset.unfiltered),
            raw_date_range,
            derived: None,
        });
        info!(
            "Registry generation {}: {} raw rows, {} unfiltered rows",
            generation, dataset.raw_rows, dataset.unfiltered_rows
        );
        generation
    }

    /// Publish `active`/`totals` computed against `generation`.
    ///
    /// Returns `false`, leaving the registry untouched, when the source was
    /// replaced in the meantime.
    pub fn replace_derived(&self, generation: u64, derived: DerivedViews) -> bool {
        let mut current = self.current.write();
        if current.generation != generation {
            debug!(
                "Discarding derived views for generation {} (current {})",
                generation, current.generation
            );
            return false;
        }
        let mut next = (**current).clone();
        next.derived = Some(derived);
        *current = Arc::new(next);
        true
    }

    /// Drop every view, e.g. after the workbook disappeared.
    pub fn clear(&self) -> u64 {
        let mut current = self.current.write();
        let generation = current.generation + 1;
        *current = Arc::new(DatasetSnapshot {
            generation,
            ..Default::default()
        });
        info!("Registry cleared (generation {})", generation);
        generation
    }
}
