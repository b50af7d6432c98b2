//! Filter engine and dropdown suggestions over the baseline views.
//!
//! - [`filtering`]: apply a [`FilterSpec`](crate::models::FilterSpec) to produce `active` and `totals`
//! - [`suggestions`]: per-dimension value lists for dependent dropdowns
//! - [`frames`]: typed extraction from collected frames

pub mod filtering;
pub mod frames;
pub mod suggestions;

pub use filtering::{apply_filter, apply_membership, attach_windows, within_dates, FilterOutcome};
pub use frames::date_range;
pub use suggestions::{list_dimension_values, suggestion_view};
