//! Workbook discovery and dataset loading.
//!
//! [`source::WorkbookSource`] decides which workbook is active and reports its
//! modification time; [`loaders::DatasetLoader`] turns that workbook into the
//! `raw` and `unfiltered` lazy views.

pub mod loaders;
pub mod source;

pub use loaders::{DatasetLoader, LoadedDataset};
pub use source::{SourceIdentity, WorkbookSource};
