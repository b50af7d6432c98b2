//! Headline numbers for the home page.

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::domain::*;
use crate::transformations::frames::{column_i64, column_strings};

/// Flight with the largest delay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongestDelay {
    pub subtype: Option<String>,
    pub registration: Option<String>,
    pub minutes: i64,
    /// `XhYY`
    pub formatted: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightSummary {
    pub flight_count: u64,
    /// Flights delayed by at least [`LONG_DELAY_MINUTES`]
    pub long_delay_count: u64,
    pub longest: Option<LongestDelay>,
}

/// `95` -> `1h35`.
pub fn format_minutes(minutes: i64) -> String {
    let minutes = minutes.max(0);
    format!("{}h{:02}", minutes / 60, minutes % 60)
}

/// Summary over the active view. The first flight wins ties on the longest delay.
pub fn flight_summary(active: &LazyFrame) -> PolarsResult<FlightSummary> {
    let df = active
        .clone()
        .select([
            col(COL_DELAY_MINUTES),
            col(COL_SUBTYPE),
            col(COL_REGISTRATION),
        ])
        .collect()?;

    let minutes = column_i64(&df, COL_DELAY_MINUTES)?;
    let long_delay_count = minutes
        .iter()
        .flatten()
        .filter(|m| **m >= LONG_DELAY_MINUTES)
        .count() as u64;

    let mut best: Option<(usize, i64)> = None;
    for (i, m) in minutes.iter().enumerate() {
        if let Some(m) = *m {
            if m > 0 && best.map_or(true, |(_, b)| m > b) {
                best = Some((i, m));
            }
        }
    }

    let longest = match best {
        Some((i, minutes)) => {
            let subtypes = column_strings(&df, COL_SUBTYPE)?;
            let registrations = column_strings(&df, COL_REGISTRATION)?;
            Some(LongestDelay {
                subtype: subtypes.get(i).cloned().flatten(),
                registration: registrations.get(i).cloned().flatten(),
                minutes,
                formatted: format_minutes(minutes),
            })
        }
        None => None,
    };

    Ok(FlightSummary {
        flight_count: df.height() as u64,
        long_delay_count,
        longest,
    })
}
