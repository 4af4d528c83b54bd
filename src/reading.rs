//! Hourly meter readings and the annotations the billing run attaches to them.

use std::fmt;

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use rust_decimal::Decimal;

/// Identity of one physical meter: readings are grouped, sorted, and
/// accumulated per key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MeterKey {
    /// Customer account identifier.
    pub account: String,
    /// Meter identifier within the account.
    pub meter: String,
}

impl fmt::Display for MeterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "account {} meter {}", self.account, self.meter)
    }
}

/// Tier resolution and cost of one reading under one tariff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TariffCharge {
    /// Tariff name.
    pub tariff: String,
    /// Matched tier name, `None` when no tier applied.
    pub tier: Option<String>,
    /// Cost in currency units; exactly zero when no tier applied.
    pub cost: Decimal,
}

/// One meter-hour of usage.
///
/// The input fields are set at import; `daily_cumulative` and `charges` are
/// written by the billing engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Customer account identifier.
    pub account: String,
    /// Meter identifier.
    pub meter: String,
    /// Start of the metered hour, in the configured billing zone.
    pub timestamp: DateTime<Tz>,
    /// Energy used during the hour.
    pub hourly_usage: Decimal,
    /// Unit of measure as reported by the utility (e.g. `kWh`).
    pub unit: String,
    /// Utility-reported total for the day, passed through untouched.
    pub daily_total: Option<Decimal>,
    /// Usage so far on this calendar day, including this hour.
    pub daily_cumulative: Decimal,
    /// One entry per configured tariff, in tariff order.
    pub charges: Vec<TariffCharge>,
}

impl Reading {
    /// Creates an unannotated reading.
    pub fn new(
        account: impl Into<String>,
        meter: impl Into<String>,
        timestamp: DateTime<Tz>,
        hourly_usage: Decimal,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            meter: meter.into(),
            timestamp,
            hourly_usage,
            unit: unit.into(),
            daily_total: None,
            daily_cumulative: Decimal::ZERO,
            charges: Vec::new(),
        }
    }

    /// Attaches the utility-reported daily total.
    #[must_use]
    pub fn with_daily_total(mut self, daily_total: Decimal) -> Self {
        self.daily_total = Some(daily_total);
        self
    }

    /// Calendar date of the reading in the billing zone.
    pub fn local_date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// Grouping key for this reading's meter.
    pub fn meter_key(&self) -> MeterKey {
        MeterKey {
            account: self.account.clone(),
            meter: self.meter.clone(),
        }
    }

    /// Looks up the charge recorded for `tariff`.
    pub fn charge_for(&self, tariff: &str) -> Option<&TariffCharge> {
        self.charges.iter().find(|c| c.tariff == tariff)
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "account {} meter {} at {} (hourly {} {}, daily cumulative {})",
            self.account,
            self.meter,
            self.timestamp.to_rfc3339(),
            self.hourly_usage,
            self.unit,
            self.daily_cumulative
        )
    }
}
