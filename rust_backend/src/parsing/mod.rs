//! Parsers for the flight-delay workbook.
//!
//! - [`workbook`]: read the first sheet of an `.xlsx`/`.xls` file and convert the
//!   required columns into a typed polars `DataFrame`

pub mod workbook;

pub use workbook::{read_workbook, WorkbookTable};
