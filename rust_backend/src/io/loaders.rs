use log::{debug, info};
use polars::prelude::*;
use std::path::Path;

use crate::core::error::LoadError;
use crate::parsing::workbook::read_workbook;
use crate::preprocessing::preprocess;

/// Result of loading a workbook: the two baseline views plus row counts.
#[derive(Clone)]
pub struct LoadedDataset {
    /// Carrier rows, all delay codes
    pub raw: LazyFrame,
    /// Carrier rows with a technical, non-zero delay
    pub unfiltered: LazyFrame,
    pub raw_rows: usize,
    pub unfiltered_rows: usize,
}

impl std::fmt::Debug for LoadedDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedDataset")
            .field("raw_rows", &self.raw_rows)
            .field("unfiltered_rows", &self.unfiltered_rows)
            .finish()
    }
}

/// Turns a workbook into the `raw` / `unfiltered` dataset pair.
pub struct DatasetLoader;

impl DatasetLoader {
    /// Load a workbook file. Either both views are produced or an error is returned.
    pub fn load(path: &Path) -> Result<LoadedDataset, LoadError> {
        info!("Loading workbook {}", path.display());
        let table = read_workbook(path)?;
        let frame = table.to_flight_frame()?;
        Self::from_frame(frame)
    }

    /// Build both views from an already typed flight frame.
    ///
    /// Both views are materialised once so that later queries only scan memory
    /// and any plan error surfaces here rather than in a consumer.
    pub fn from_frame(frame: DataFrame) -> Result<LoadedDataset, LoadError> {
        let (raw, unfiltered) = preprocess(frame);
        let raw = raw.collect()?;
        let unfiltered = unfiltered.collect()?;
        debug!(
            "Baseline views: raw={} rows, unfiltered={} rows",
            raw.height(),
            unfiltered.height()
        );

        Ok(LoadedDataset {
            raw_rows: raw.height(),
            unfiltered_rows: unfiltered.height(),
            raw: raw.lazy(),
            unfiltered: unfiltered.lazy(),
        })
    }
}
