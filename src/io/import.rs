//! CSV import of hourly utility usage exports.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use csv::StringRecord;
use rust_decimal::Decimal;

use crate::reading::Reading;

pub const ACCOUNT_COLUMN: &str = "Account Number";
pub const METER_COLUMN: &str = "Meter Number";
pub const DAY_COLUMN: &str = "Day";
pub const HOUR_COLUMN: &str = "Hour of Day";
pub const HOURLY_TOTAL_COLUMN: &str = "Hourly Total";
pub const DAILY_TOTAL_COLUMN: &str = "Daily Total";
pub const UNIT_COLUMN: &str = "Unit of Measurement";

/// `Day`, e.g. `01/15/2024`.
const DAY_FORMAT: &str = "%m/%d/%Y";
/// `Hour of Day`, e.g. `11:00 PM`.
const HOUR_FORMAT: &str = "%I:%M %p";

/// Columns every export must carry.
const REQUIRED_COLUMNS: [&str; 6] = [
    ACCOUNT_COLUMN,
    METER_COLUMN,
    DAY_COLUMN,
    HOUR_COLUMN,
    HOURLY_TOTAL_COLUMN,
    UNIT_COLUMN,
];

/// Failure to turn a usage export into readings.
///
/// Row numbers are 1-based data rows; the header is not counted.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("cannot open \"{}\": {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("header has no \"{0}\" column")]
    MissingHeader(&'static str),
    #[error("row {row}: missing column \"{column}\"")]
    MissingColumn { row: usize, column: &'static str },
    #[error("row {row}: invalid {column} \"{value}\": {message}")]
    InvalidField {
        row: usize,
        column: &'static str,
        value: String,
        message: String,
    },
}

/// Reads every row of a usage export.
///
/// Required columns are matched by header name, in any order; extra columns
/// are ignored. `Daily Total` is optional and passed through when present
/// and non-empty.
///
/// # Errors
///
/// Fails when a required column is missing from the header, and on the
/// first malformed row; nothing is returned for partial input.
pub fn read_readings<R: Read>(reader: R, tz: Tz) -> Result<Vec<Reading>, ImportError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();
    if let Some(column) = REQUIRED_COLUMNS
        .into_iter()
        .find(|c| !headers.iter().any(|h| h == *c))
    {
        return Err(ImportError::MissingHeader(column));
    }

    let mut readings = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        readings.push(record_to_reading(&record?, &headers, i + 1, tz)?);
    }

    tracing::info!(rows = readings.len(), "usage export read");
    Ok(readings)
}

/// Opens `path` and reads it with [`read_readings`].
///
/// # Errors
///
/// Returns [`ImportError::Open`] if the file cannot be opened, otherwise
/// whatever [`read_readings`] returns.
pub fn read_readings_from_path(path: &Path, tz: Tz) -> Result<Vec<Reading>, ImportError> {
    let file = File::open(path).map_err(|source| ImportError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    read_readings(std::io::BufReader::new(file), tz)
}

/// Parses a `Day` / `Hour of Day` pair as local time in `tz`.
///
/// Ambiguous local times (the repeated hour when clocks fall back) resolve
/// to the earlier instant; times skipped when clocks spring forward are
/// rejected.
///
/// # Errors
///
/// Returns a message describing the malformed or non-existent time.
pub fn parse_timestamp(day: &str, hour: &str, tz: Tz) -> Result<DateTime<Tz>, String> {
    localize(parse_day(day)?.and_time(parse_hour(hour)?), tz)
}

fn parse_day(day: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(day, DAY_FORMAT).map_err(|e| format!("expected MM/DD/YYYY ({e})"))
}

fn parse_hour(hour: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(hour, HOUR_FORMAT).map_err(|e| format!("expected h:mm AM/PM ({e})"))
}

fn localize(naive: NaiveDateTime, tz: Tz) -> Result<DateTime<Tz>, String> {
    tz.from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| format!("{naive} does not exist in {tz}"))
}

fn record_to_reading(
    record: &StringRecord,
    headers: &StringRecord,
    row: usize,
    tz: Tz,
) -> Result<Reading, ImportError> {
    let lookup = |name: &str| -> Option<&str> {
        headers
            .iter()
            .position(|h| h == name)
            .and_then(|idx| record.get(idx))
    };
    let get = |column: &'static str| -> Result<&str, ImportError> {
        lookup(column).ok_or(ImportError::MissingColumn { row, column })
    };

    let invalid = |column: &'static str, value: &str| {
        let value = value.to_string();
        move |message| ImportError::InvalidField {
            row,
            column,
            value,
            message,
        }
    };

    let day = get(DAY_COLUMN)?;
    let hour = get(HOUR_COLUMN)?;
    let date = parse_day(day).map_err(invalid(DAY_COLUMN, day))?;
    let time = parse_hour(hour).map_err(invalid(HOUR_COLUMN, hour))?;
    let timestamp =
        localize(date.and_time(time), tz).map_err(invalid(HOUR_COLUMN, &format!("{day} {hour}")))?;

    let hourly_usage = parse_decimal(get(HOURLY_TOTAL_COLUMN)?, HOURLY_TOTAL_COLUMN, row)?;

    let mut reading = Reading::new(
        get(ACCOUNT_COLUMN)?,
        get(METER_COLUMN)?,
        timestamp,
        hourly_usage,
        get(UNIT_COLUMN)?,
    );
    if let Some(total) = lookup(DAILY_TOTAL_COLUMN).filter(|s| !s.is_empty()) {
        reading = reading.with_daily_total(parse_decimal(total, DAILY_TOTAL_COLUMN, row)?);
    }
    Ok(reading)
}

/// Parses a plain decimal: optional sign, digits, at most one `.`.
///
/// Digit separators, exponents and values with more fractional digits
/// than a [`Decimal`] can hold are rejected rather than reinterpreted.
fn parse_decimal(value: &str, column: &'static str, row: usize) -> Result<Decimal, ImportError> {
    let invalid = |message: String| ImportError::InvalidField {
        row,
        column,
        value: value.to_string(),
        message,
    };

    let unsigned = value.strip_prefix(|c: char| c == '-' || c == '+').unwrap_or(value);
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !all_digits(whole) || !all_digits(fraction) {
        return Err(invalid("expected a plain decimal number".to_string()));
    }

    let parsed = Decimal::from_str(value).map_err(|e| invalid(e.to_string()))?;
    if fraction.len() > parsed.scale() as usize {
        return Err(invalid("too many digits to represent without rounding".to_string()));
    }
    Ok(parsed)
}
