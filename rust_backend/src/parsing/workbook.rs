use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use log::debug;
use polars::prelude::*;
use std::path::Path;

use crate::core::domain::*;
use crate::core::error::LoadError;

/// Date layouts accepted when a day cell holds text instead of a date.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M"];
const TIME_FORMATS: &[&str] = &["%H:%M", "%H:%M:%S"];

/// First sheet of a workbook: header row plus data rows.
#[derive(Debug, Clone)]
pub struct WorkbookTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Data>>,
}

/// Read the first worksheet of a workbook file.
pub fn read_workbook(path: &Path) -> Result<WorkbookTable, LoadError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| LoadError::unreadable(format!("{}: {}", path.display(), e)))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| LoadError::unreadable(format!("{}: no sheets", path.display())))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| LoadError::unreadable(format!("{}: {}", sheet_name, e)))?;

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(header) => header.iter().map(|cell| cell.to_string().trim().to_string()).collect(),
        None => Vec::new(),
    };
    let rows: Vec<Vec<Data>> = rows.map(|row| row.to_vec()).collect();
    debug!("Read sheet '{}' with {} data rows", sheet_name, rows.len());

    Ok(WorkbookTable { headers, rows })
}

fn parse_text_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Excel serial day numbers count from 1899-12-30.
fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    base.checked_add_signed(Duration::milliseconds(millis))
}

fn cell_date(cell: &Data) -> Result<Option<NaiveDate>, String> {
    match cell {
        Data::Empty => Ok(None),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| Some(d.date()))
            .ok_or_else(|| format!("invalid date cell {:?}", dt)),
        Data::DateTimeIso(text) | Data::String(text) => {
            if text.trim().is_empty() {
                return Ok(None);
            }
            parse_text_date(text)
                .map(Some)
                .ok_or_else(|| format!("unparsable date '{}'", text))
        }
        Data::Float(serial) => serial_to_datetime(*serial)
            .map(|d| Some(d.date()))
            .ok_or_else(|| format!("invalid date serial {}", serial)),
        Data::Int(serial) => serial_to_datetime(*serial as f64)
            .map(|d| Some(d.date()))
            .ok_or_else(|| format!("invalid date serial {}", serial)),
        other => Err(format!("unexpected date cell {:?}", other)),
    }
}

/// Time-of-day cells arrive either as `HH:MM` text or as an Excel time fraction.
fn cell_time(cell: &Data) -> Result<Option<NaiveTime>, String> {
    match cell {
        Data::Empty => Ok(None),
        Data::String(text) | Data::DateTimeIso(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            TIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveTime::parse_from_str(text, fmt).ok())
                .map(Some)
                .ok_or_else(|| format!("unparsable time '{}'", text))
        }
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| Some(d.time()))
            .ok_or_else(|| format!("invalid time cell {:?}", dt)),
        Data::Float(fraction) => {
            let seconds = (fraction.fract() * 86_400.0).round() as u32 % 86_400;
            Ok(NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0))
        }
        other => Err(format!("unexpected time cell {:?}", other)),
    }
}

fn cell_int(cell: &Data) -> Result<Option<i64>, String> {
    match cell {
        Data::Empty => Ok(None),
        Data::Int(i) => Ok(Some(*i)),
        Data::Float(f) if f.is_finite() && f.fract() == 0.0 => Ok(Some(*f as i64)),
        Data::Bool(b) => Ok(Some(*b as i64)),
        Data::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            text.parse::<i64>()
                .or_else(|_| {
                    text.parse::<f64>()
                        .ok()
                        .filter(|f| f.fract() == 0.0)
                        .map(|f| f as i64)
                        .ok_or(())
                })
                .map(Some)
                .map_err(|_| format!("not an integer: '{}'", text))
        }
        other => Err(format!("not an integer: {:?}", other)),
    }
}

fn cell_string(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        Data::Float(f) if f.fract() == 0.0 => Some(format!("{}", *f as i64)),
        other => Some(other.to_string()),
    }
}

impl WorkbookTable {
    fn column_index(&self, name: &str) -> Result<usize, LoadError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| LoadError::missing_column(name))
    }

    /// Convert the required columns into a typed flight frame.
    ///
    /// Day and time cells are combined into [`COL_DEP_DATETIME`]; a row missing
    /// either part gets a null timestamp. Unparsable cells fail the whole load.
    pub fn to_flight_frame(&self) -> Result<DataFrame, LoadError> {
        let indices = REQUIRED_COLUMNS
            .iter()
            .map(|name| self.column_index(name))
            .collect::<Result<Vec<_>, _>>()?;
        // Same order as REQUIRED_COLUMNS
        let (day_i, time_i, code_i, delay_i) = (indices[0], indices[1], indices[2], indices[3]);
        let (subtype_i, reg_i, airport_i) = (indices[4], indices[5], indices[6]);
        let (family_i, desc_i) = (indices[7], indices[8]);

        let n = self.rows.len();
        let mut dep_day: Vec<Option<i32>> = Vec::with_capacity(n);
        let mut dep_time: Vec<Option<String>> = Vec::with_capacity(n);
        let mut dep_datetime: Vec<Option<i64>> = Vec::with_capacity(n);
        let mut delay_code: Vec<Option<i64>> = Vec::with_capacity(n);
        let mut delay_minutes: Vec<Option<i64>> = Vec::with_capacity(n);
        let mut subtype: Vec<Option<String>> = Vec::with_capacity(n);
        let mut registration: Vec<Option<String>> = Vec::with_capacity(n);
        let mut airport: Vec<Option<String>> = Vec::with_capacity(n);
        let mut family: Vec<Option<String>> = Vec::with_capacity(n);
        let mut description: Vec<Option<String>> = Vec::with_capacity(n);

        let empty = Data::Empty;
        for (row_idx, row) in self.rows.iter().enumerate() {
            let cell = |i: usize| row.get(i).unwrap_or(&empty);
            let at = |column: &str, msg: String| {
                LoadError::parse(format!("row {}, column {}: {}", row_idx + 2, column, msg))
            };

            let day = cell_date(cell(day_i)).map_err(|m| at(COL_DEP_DAY, m))?;
            let time = cell_time(cell(time_i)).map_err(|m| at(COL_DEP_TIME, m))?;

            dep_day.push(day.map(date_to_days));
            dep_time.push(time.map(|t| format!("{:02}:{:02}", t.hour(), t.minute())));
            dep_datetime.push(match (day, time) {
                (Some(d), Some(t)) => Some(d.and_time(t).and_utc().timestamp_millis()),
                _ => None,
            });
            delay_code.push(cell_int(cell(code_i)).map_err(|m| at(COL_DELAY_CODE, m))?);
            delay_minutes.push(cell_int(cell(delay_i)).map_err(|m| at(COL_DELAY_MINUTES, m))?);
            subtype.push(cell_string(cell(subtype_i)));
            registration.push(cell_string(cell(reg_i)));
            airport.push(cell_string(cell(airport_i)));
            family.push(cell_string(cell(family_i)));
            description.push(cell_string(cell(desc_i)));
        }

        let columns = vec![
            Series::new(COL_DEP_DAY.into(), dep_day).cast(&DataType::Date)?,
            Series::new(COL_DEP_TIME.into(), dep_time),
            Series::new(COL_DEP_DATETIME.into(), dep_datetime)
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?,
            Series::new(COL_DELAY_CODE.into(), delay_code),
            Series::new(COL_DELAY_MINUTES.into(), delay_minutes),
            Series::new(COL_SUBTYPE.into(), subtype),
            Series::new(COL_REGISTRATION.into(), registration),
            Series::new(COL_DEP_AIRPORT.into(), airport),
            Series::new(COL_FAMILY.into(), family),
            Series::new(COL_CODE_DESCRIPTION.into(), description),
        ];

        Ok(DataFrame::new(columns.into_iter().map(Column::from).collect())?)
    }
}
