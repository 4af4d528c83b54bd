//! API response and query types.
//!
//! Decimal amounts are serialized as strings so no precision is lost in
//! JSON; field names follow the CSV export columns.

use serde::{Deserialize, Serialize};

use crate::billing::{MeterSummary, PlanTotals};
use crate::reading::{Reading, TariffCharge};

/// Query parameters for `GET /readings`.
#[derive(Debug, Default, Deserialize)]
pub struct ReadingsQuery {
    pub account: Option<String>,
    /// Only valid together with `account`.
    pub meter: Option<String>,
}

/// One tariff's resolution for one reading.
#[derive(Debug, Serialize)]
pub struct ChargeRecord {
    pub tariff: String,
    /// `null` when the tariff had no rate for the hour.
    pub tier: Option<String>,
    pub cost: String,
}

impl From<&TariffCharge> for ChargeRecord {
    fn from(c: &TariffCharge) -> Self {
        Self {
            tariff: c.tariff.clone(),
            tier: c.tier.clone(),
            cost: c.cost.to_string(),
        }
    }
}

/// A billed reading.
#[derive(Debug, Serialize)]
pub struct ReadingRecord {
    pub account: String,
    pub meter: String,
    /// RFC 3339 with the billing zone's offset.
    pub timestamp: String,
    pub hourly_total: String,
    pub daily_cumulative: String,
    pub daily_total: Option<String>,
    pub unit: String,
    pub charges: Vec<ChargeRecord>,
}

impl From<&Reading> for ReadingRecord {
    fn from(r: &Reading) -> Self {
        Self {
            account: r.account.clone(),
            meter: r.meter.clone(),
            timestamp: r.timestamp.to_rfc3339(),
            hourly_total: r.hourly_usage.to_string(),
            daily_cumulative: r.daily_cumulative.to_string(),
            daily_total: r.daily_total.map(|d| d.to_string()),
            unit: r.unit.clone(),
            charges: r.charges.iter().map(ChargeRecord::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlanRecord {
    pub tariff: String,
    pub energy_cost: String,
    pub service_charges: String,
    pub total_cost: String,
    pub unmatched_hours: usize,
    pub cheapest: bool,
}

impl PlanRecord {
    fn new(plan: &PlanTotals, cheapest: bool) -> Self {
        Self {
            tariff: plan.tariff.clone(),
            energy_cost: plan.energy_cost.to_string(),
            service_charges: plan.service_charges.to_string(),
            total_cost: plan.total_cost().to_string(),
            unmatched_hours: plan.unmatched_hours,
            cheapest,
        }
    }
}

/// Plan comparison for one meter.
#[derive(Debug, Serialize)]
pub struct MeterSummaryRecord {
    pub account: String,
    pub meter: String,
    pub unit: String,
    pub hours: usize,
    pub usage: String,
    pub billing_periods: u32,
    pub plans: Vec<PlanRecord>,
}

impl From<&MeterSummary> for MeterSummaryRecord {
    fn from(m: &MeterSummary) -> Self {
        let cheapest = m.cheapest().map(|p| p.tariff.as_str());
        Self {
            account: m.key.account.clone(),
            meter: m.key.meter.clone(),
            unit: m.unit.clone(),
            hours: m.hours,
            usage: m.usage.to_string(),
            billing_periods: m.billing_periods,
            plans: m
                .plans
                .iter()
                .map(|p| PlanRecord::new(p, Some(p.tariff.as_str()) == cheapest))
                .collect(),
        }
    }
}

/// Error response body for 4xx responses.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
