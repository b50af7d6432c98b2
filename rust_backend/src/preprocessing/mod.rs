pub mod baseline;

pub use baseline::{any_of, filter_carrier, filter_non_zero_delay, filter_technical, preprocess};
