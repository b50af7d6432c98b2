//! User filters and their identity.
//!
//! A [`FilterSpec`] is the validated, immutable form of what the operator picked
//! in the filter panel. Two notions of equality matter downstream:
//!
//! - the [`fingerprint`](FilterSpec::fingerprint), which ignores segmentation
//!   and empty fields and keys the computation cache;
//! - [`segmentation_eq`](FilterSpec::segmentation_eq), which together with the
//!   fingerprint decides whether the panel holds unsubmitted edits.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::core::{DashboardError, DashboardResult};

const FINGERPRINT_SEPARATOR: &str = "|";

/// Calendar unit of a segmentation window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentationUnit {
    #[default]
    Day,
    Week,
    Month,
    Year,
}

impl SegmentationUnit {
    /// Short code used by the filter panel and in duration strings (`d`, `w`, `mo`, `y`).
    pub fn code(&self) -> &'static str {
        match self {
            SegmentationUnit::Day => "d",
            SegmentationUnit::Week => "w",
            SegmentationUnit::Month => "mo",
            SegmentationUnit::Year => "y",
        }
    }
}

impl fmt::Display for SegmentationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for SegmentationUnit {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "d" | "day" | "days" => Ok(SegmentationUnit::Day),
            "w" | "week" | "weeks" => Ok(SegmentationUnit::Week),
            "mo" | "month" | "months" => Ok(SegmentationUnit::Month),
            "y" | "year" | "years" => Ok(SegmentationUnit::Year),
            other => Err(DashboardError::InvalidFilterSpec(format!(
                "unknown segmentation unit '{}'",
                other
            ))),
        }
    }
}

/// A tumbling window definition with a strictly positive width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segmentation {
    pub width: u32,
    pub unit: SegmentationUnit,
}

impl Segmentation {
    /// Duration string understood by the columnar engine, e.g. `2w`.
    pub fn every(&self) -> String {
        format!("{}{}", self.width, self.unit.code())
    }
}

/// Filter dimensions that can be excluded when listing dropdown values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Subtypes,
    Registrations,
    DelayCodes,
}

/// Validated filter selection.
///
/// Empty membership sets mean "no restriction", exactly like `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default)]
    pub subtypes: Option<BTreeSet<String>>,
    #[serde(default)]
    pub registrations: Option<BTreeSet<String>>,
    #[serde(default)]
    pub delay_codes: Option<BTreeSet<i32>>,
    #[serde(default)]
    pub date_start: Option<NaiveDate>,
    #[serde(default)]
    pub date_end: Option<NaiveDate>,
    /// Zero or absent disables segmentation
    #[serde(default)]
    pub segmentation_width: Option<u32>,
    #[serde(default)]
    pub segmentation_unit: SegmentationUnit,
}

fn non_empty<T>(set: &Option<BTreeSet<T>>) -> Option<&BTreeSet<T>> {
    set.as_ref().filter(|s| !s.is_empty())
}

fn join<T: ToString>(set: &BTreeSet<T>, sep: &str) -> String {
    set.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(sep)
}

/// Backslash-escape the characters that delimit fingerprint fields and values.
fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | ',' | '|' | '=') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn join_escaped<T: ToString>(set: &BTreeSet<T>) -> String {
    set.iter()
        .map(|v| escape_value(&v.to_string()))
        .collect::<Vec<_>>()
        .join(",")
}

impl FilterSpec {
    pub fn subtypes(&self) -> Option<&BTreeSet<String>> {
        non_empty(&self.subtypes)
    }

    pub fn registrations(&self) -> Option<&BTreeSet<String>> {
        non_empty(&self.registrations)
    }

    pub fn delay_codes(&self) -> Option<&BTreeSet<i32>> {
        non_empty(&self.delay_codes)
    }

    /// Active segmentation, `None` when the width is unset or zero.
    pub fn segmentation(&self) -> Option<Segmentation> {
        match self.segmentation_width {
            Some(width) if width > 0 => Some(Segmentation {
                width,
                unit: self.segmentation_unit,
            }),
            _ => None,
        }
    }

    /// Copy of this spec with one dimension cleared.
    pub fn without(&self, dimension: Dimension) -> FilterSpec {
        let mut spec = self.clone();
        match dimension {
            Dimension::Subtypes => spec.subtypes = None,
            Dimension::Registrations => spec.registrations = None,
            Dimension::DelayCodes => spec.delay_codes = None,
        }
        spec
    }

    pub fn with_segmentation(&self, width: u32, unit: SegmentationUnit) -> FilterSpec {
        FilterSpec {
            segmentation_width: Some(width),
            segmentation_unit: unit,
            ..self.clone()
        }
    }

    /// Canonical identity modulo segmentation and empty fields.
    ///
    /// Keys appear in alphabetical order as `key=value`, lists are sorted and
    /// comma-joined, dates are ISO formatted.
    pub fn fingerprint(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(end) = self.date_end {
            parts.push(format!("date_end={}", end.format("%Y-%m-%d")));
        }
        if let Some(start) = self.date_start {
            parts.push(format!("date_start={}", start.format("%Y-%m-%d")));
        }
        if let Some(codes) = self.delay_codes() {
            parts.push(format!("delay_codes={}", join_escaped(codes)));
        }
        if let Some(registrations) = self.registrations() {
            parts.push(format!("registrations={}", join_escaped(registrations)));
        }
        if let Some(subtypes) = self.subtypes() {
            parts.push(format!("subtypes={}", join_escaped(subtypes)));
        }
        parts.join(FINGERPRINT_SEPARATOR)
    }

    /// Widths must match; units only matter when a width is set.
    pub fn segmentation_eq(&self, other: &FilterSpec) -> bool {
        let width = |spec: &FilterSpec| spec.segmentation().map(|s| s.width);
        match (self.segmentation(), other.segmentation()) {
            (Some(a), Some(b)) => a == b,
            _ => width(self) == width(other),
        }
    }

    /// Deterministic label describing the selection, used for exported files.
    pub fn export_name(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if self.date_start.is_none() && self.date_end.is_none() {
            parts.push("all_dates".to_string());
        }
        if let Some(start) = self.date_start {
            parts.push(format!("from_{}", start.format("%Y-%m-%d")));
        }
        if let Some(end) = self.date_end {
            parts.push(format!("to_{}", end.format("%Y-%m-%d")));
        }

        match self.segmentation() {
            Some(seg) => parts.push(format!("segmentation_{}", seg.every())),
            None => parts.push("without_segmentation".to_string()),
        }

        match self.delay_codes() {
            Some(codes) => parts.push(format!("delays_{}", join(codes, "_"))),
            None => parts.push("all_delays".to_string()),
        }
        match self.subtypes() {
            Some(subtypes) => parts.push(format!("subtype_{}", join(subtypes, "_"))),
            None => parts.push("all_subtypes".to_string()),
        }
        match self.registrations() {
            Some(registrations) => parts.push(format!("matricule_{}", join(registrations, "_"))),
            None => parts.push("all_matricules".to_string()),
        }

        parts.join("_")
    }
}

/// Loosely typed filter panel values, as submitted by the UI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterForm {
    #[serde(default)]
    pub subtypes: Vec<String>,
    #[serde(default)]
    pub registrations: Vec<String>,
    #[serde(default)]
    pub delay_codes: Vec<Value>,
    #[serde(default)]
    pub date_start: Option<String>,
    #[serde(default)]
    pub date_end: Option<String>,
    #[serde(default)]
    pub segmentation_width: Option<Value>,
    #[serde(default)]
    pub segmentation_unit: Option<String>,
}

fn parse_integer(field: &str, value: &Value) -> DashboardResult<Option<i64>> {
    let invalid = || {
        DashboardError::InvalidFilterSpec(format!("{} must be an integer, got {}", field, value))
    };
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Some(i)),
            None => match n.as_f64() {
                Some(f) if f.is_finite() && f.fract() == 0.0 => Ok(Some(f as i64)),
                _ => Err(invalid()),
            },
        },
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s.trim().parse::<i64>().map(Some).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn parse_date(field: &str, value: &Option<String>) -> DashboardResult<Option<NaiveDate>> {
    let text = match value.as_deref().map(str::trim) {
        None | Some("") => return Ok(None),
        Some(text) => text,
    };
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S").map(|dt| dt.date()))
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .map(Some)
        .map_err(|_| {
            DashboardError::InvalidFilterSpec(format!("{} is not a date: '{}'", field, text))
        })
}

fn string_set(values: &[String]) -> Option<BTreeSet<String>> {
    let set: BTreeSet<String> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    (!set.is_empty()).then_some(set)
}

impl TryFrom<FilterForm> for FilterSpec {
    type Error = DashboardError;

    fn try_from(form: FilterForm) -> DashboardResult<Self> {
        let mut codes = BTreeSet::new();
        for value in &form.delay_codes {
            if let Some(code) = parse_integer("delay code", value)? {
                let code = i32::try_from(code).map_err(|_| {
                    DashboardError::InvalidFilterSpec(format!("delay code out of range: {}", code))
                })?;
                codes.insert(code);
            }
        }

        let segmentation_width = match &form.segmentation_width {
            Some(value) => match parse_integer("segmentation width", value)? {
                Some(w) if w < 0 => {
                    return Err(DashboardError::InvalidFilterSpec(format!(
                        "segmentation width must not be negative, got {}",
                        w
                    )))
                }
                Some(w) => Some(u32::try_from(w).map_err(|_| {
                    DashboardError::InvalidFilterSpec(format!("segmentation width too large: {}", w))
                })?),
                None => None,
            },
            None => None,
        };

        let segmentation_unit = match form.segmentation_unit.as_deref().map(str::trim) {
            None | Some("") => SegmentationUnit::default(),
            Some(unit) => unit.parse()?,
        };

        Ok(FilterSpec {
            subtypes: string_set(&form.subtypes),
            registrations: string_set(&form.registrations),
            delay_codes: (!codes.is_empty()).then_some(codes),
            date_start: parse_date("date_start", &form.date_start)?,
            date_end: parse_date("date_end", &form.date_end)?,
            segmentation_width,
            segmentation_unit,
        })
    }
}

/// Whether the filter panel matches the submitted spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitState {
    Synced,
    Pending,
}

impl SubmitState {
    pub fn compare(candidate: &FilterSpec, active: &FilterSpec) -> Self {
        if candidate.fingerprint() == active.fingerprint() && candidate.segmentation_eq(active) {
            SubmitState::Synced
        } else {
            SubmitState::Pending
        }
    }
}
