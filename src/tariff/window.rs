//! Time-window predicates: the data form of every rate condition.
//!
//! A [`Window`] inspects either the reading's daily cumulative usage or its
//! local timestamp. All ranges are inclusive on both ends, and hour,
//! weekday, and calendar ranges whose end precedes their start wrap around
//! (midnight, Sunday, and New Year respectively).

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Timelike};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::reading::Reading;

/// Field name reported for usage-threshold conditions.
pub const CUMULATIVE_FIELD: &str = "Daily Cumulative";
/// Field name reported for calendar, hour, and weekday conditions.
pub const TIMESTAMP_FIELD: &str = "Timestamp";

const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Invalid window definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("invalid month/day \"{0}\" (expected MM/DD)")]
    MonthDay(String),
    #[error("hour {0} is outside 0..=23")]
    Hour(u32),
    #[error("weekday {0} is outside 0..=6 (Monday = 0)")]
    Weekday(u32),
    #[error("`any` window must list at least one window")]
    EmptyAny,
}

/// Comparison operator of a usage threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = "<")]
    Below,
    #[serde(rename = "<=")]
    AtMost,
    #[serde(rename = ">")]
    Above,
    #[serde(rename = ">=")]
    AtLeast,
}

impl Comparison {
    /// Applies the operator as `value <op> limit`.
    pub fn holds(self, value: Decimal, limit: Decimal) -> bool {
        match self {
            Self::Below => value < limit,
            Self::AtMost => value <= limit,
            Self::Above => value > limit,
            Self::AtLeast => value >= limit,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Below => "<",
            Self::AtMost => "<=",
            Self::Above => ">",
            Self::AtLeast => ">=",
        })
    }
}

/// A month and day with no year, ordered chronologically within a year.
///
/// Parsed from and rendered as `MM/DD`. February 29 is accepted; it simply
/// never matches in non-leap years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthDay {
    month: u32,
    day: u32,
}

impl MonthDay {
    /// Creates a month/day, rejecting dates that exist in no year.
    ///
    /// # Errors
    ///
    /// Returns [`WindowError::MonthDay`] for e.g. `2/30` or `13/01`.
    pub fn new(month: u32, day: u32) -> Result<Self, WindowError> {
        // 2000 is a leap year, so Feb 29 passes.
        if NaiveDate::from_ymd_opt(2000, month, day).is_none() {
            return Err(WindowError::MonthDay(format!("{month}/{day}")));
        }
        Ok(Self { month, day })
    }

    /// Month/day from literal parts already known to name a real date.
    pub(crate) const fn from_parts(month: u32, day: u32) -> Self {
        Self { month, day }
    }

    /// Month/day of a calendar date.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            month: date.month(),
            day: date.day(),
        }
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn day(self) -> u32 {
        self.day
    }
}

impl FromStr for MonthDay {
    type Err = WindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || WindowError::MonthDay(s.to_string());
        let (month, day) = s.trim().split_once('/').ok_or_else(invalid)?;
        let month = month.trim().parse().map_err(|_| invalid())?;
        let day = day.trim().parse().map_err(|_| invalid())?;
        Self::new(month, day).map_err(|_| invalid())
    }
}

impl TryFrom<String> for MonthDay {
    type Error = WindowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthDay> for String {
    fn from(value: MonthDay) -> Self {
        value.to_string()
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}", self.month, self.day)
    }
}

/// Predicate over one reading.
///
/// Deserialized from an internally tagged table, e.g.
/// `{ kind = "hours", start = 19, end = 10 }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Window {
    /// Daily cumulative usage compared against `limit`.
    Threshold { op: Comparison, limit: Decimal },
    /// Local calendar date within `[start, end]`, wrapping into the next
    /// year when `end` precedes `start`.
    Calendar { start: MonthDay, end: MonthDay },
    /// Local hour within `[start, end]`, wrapping past midnight when
    /// `start > end`.
    Hours { start: u32, end: u32 },
    /// ISO weekday index (Monday = 0) within `[start, end]`, wrapping past
    /// Sunday when `start > end`.
    Weekdays { start: u32, end: u32 },
    /// Matches when any nested window matches.
    Any { of: Vec<Window> },
}

impl Window {
    /// Evaluates the window against `reading`.
    pub fn matches(&self, reading: &Reading) -> bool {
        match self {
            Self::Threshold { op, limit } => op.holds(reading.daily_cumulative, *limit),
            Self::Calendar { start, end } => calendar_contains(*start, *end, reading.local_date()),
            Self::Hours { start, end } => wrapping_contains(*start, *end, reading.timestamp.hour()),
            Self::Weekdays { start, end } => wrapping_contains(
                *start,
                *end,
                reading.timestamp.weekday().num_days_from_monday(),
            ),
            Self::Any { of } => of.iter().any(|w| w.matches(reading)),
        }
    }

    /// Name of the reading field this window inspects.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Threshold { .. } => CUMULATIVE_FIELD,
            Self::Any { of } if of.iter().all(|w| matches!(w, Self::Threshold { .. })) => {
                CUMULATIVE_FIELD
            }
            _ => TIMESTAMP_FIELD,
        }
    }

    /// Checks ranges and nesting.
    ///
    /// # Errors
    ///
    /// Returns the first out-of-range bound or an empty `any` list.
    pub fn validate(&self) -> Result<(), WindowError> {
        match self {
            Self::Threshold { .. } | Self::Calendar { .. } => Ok(()),
            Self::Hours { start, end } => {
                for hour in [*start, *end] {
                    if hour > 23 {
                        return Err(WindowError::Hour(hour));
                    }
                }
                Ok(())
            }
            Self::Weekdays { start, end } => {
                for day in [*start, *end] {
                    if day > 6 {
                        return Err(WindowError::Weekday(day));
                    }
                }
                Ok(())
            }
            Self::Any { of } => {
                if of.is_empty() {
                    return Err(WindowError::EmptyAny);
                }
                of.iter().try_for_each(Window::validate)
            }
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Threshold { op, limit } => write!(f, "{op}{limit}"),
            Self::Calendar { start, end } => write!(f, "{start} <= day <= {end}"),
            Self::Hours { start, end } => {
                write!(f, "{start:02}:00:00 <= hour <= {end:02}:59:59")
            }
            Self::Weekdays { start, end } => write!(
                f,
                "{} <= day <= {}",
                weekday_name(*start),
                weekday_name(*end)
            ),
            Self::Any { of } => {
                for (i, w) in of.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" or ")?;
                    }
                    write!(f, "{w}")?;
                }
                Ok(())
            }
        }
    }
}

fn weekday_name(index: u32) -> &'static str {
    WEEKDAY_NAMES.get(index as usize).copied().unwrap_or("?")
}

/// Inclusive `[start, end]` membership that wraps when `start > end`.
///
/// A wrapped range is the union of `[start, max]` and `[0, end]`, never a
/// single comparison.
fn wrapping_contains(start: u32, end: u32, value: u32) -> bool {
    if start <= end {
        start <= value && value <= end
    } else {
        value >= start || value <= end
    }
}

/// Inclusive calendar membership ignoring the year.
///
/// When `end` precedes `start` the window runs from `start` of year Y to
/// `end` of Y+1, so a date matches if it falls on or after `start` in its
/// own year (window opened this year) or on or before `end` (window opened
/// last year).
fn calendar_contains(start: MonthDay, end: MonthDay, date: NaiveDate) -> bool {
    let day = MonthDay::of(date);
    if start <= end {
        start <= day && day <= end
    } else {
        day >= start || day <= end
    }
}
