//! Post-hoc plan comparison computed from billed readings.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Datelike;
use rust_decimal::Decimal;

use crate::reading::{MeterKey, Reading};
use crate::tariff::Tariff;

use super::engine::BillingError;

/// What one meter would have paid under one tariff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanTotals {
    /// Tariff name.
    pub tariff: String,
    /// Sum of per-hour energy costs.
    pub energy_cost: Decimal,
    /// Service charge times the number of billing periods.
    pub service_charges: Decimal,
    /// Hours for which the tariff had no tier (priced at zero).
    pub unmatched_hours: usize,
}

impl PlanTotals {
    /// Energy cost plus service charges.
    ///
    /// [`BillSummary::from_readings`] only builds totals for which this sum
    /// fits.
    pub fn total_cost(&self) -> Decimal {
        self.energy_cost + self.service_charges
    }
}

/// Plan comparison for one meter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterSummary {
    pub key: MeterKey,
    /// Unit of the first reading.
    pub unit: String,
    /// Number of readings.
    pub hours: usize,
    /// Total usage over all readings.
    pub usage: Decimal,
    /// Distinct calendar months the readings touch.
    pub billing_periods: u32,
    /// One entry per tariff, in tariff order.
    pub plans: Vec<PlanTotals>,
}

impl MeterSummary {
    /// Plan with the lowest total; the earliest declared wins a tie.
    pub fn cheapest(&self) -> Option<&PlanTotals> {
        self.plans.iter().min_by_key(|p| p.total_cost())
    }
}

/// Per-meter plan comparison for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BillSummary {
    pub meters: Vec<MeterSummary>,
}

struct MeterAccumulator {
    unit: String,
    hours: usize,
    usage: Decimal,
    months: BTreeSet<(i32, u32)>,
    energy: Vec<Decimal>,
    unmatched: Vec<usize>,
}

impl BillSummary {
    /// Aggregates billed readings per meter and tariff.
    ///
    /// Readings need not be sorted. Charges are looked up by tariff name;
    /// a reading missing a tariff's charge contributes nothing to it.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Overflow`] when a meter's usage, energy cost,
    /// service charges, or total cost does not fit in a [`Decimal`].
    pub fn from_readings(readings: &[Reading], tariffs: &[Tariff]) -> Result<Self, BillingError> {
        let mut per_meter: BTreeMap<MeterKey, MeterAccumulator> = BTreeMap::new();

        for reading in readings {
            let key = reading.meter_key();
            let overflow = |quantity| BillingError::Overflow {
                quantity,
                context: key.to_string(),
            };
            let acc = per_meter
                .entry(key.clone())
                .or_insert_with(|| MeterAccumulator {
                    unit: reading.unit.clone(),
                    hours: 0,
                    usage: Decimal::ZERO,
                    months: BTreeSet::new(),
                    energy: vec![Decimal::ZERO; tariffs.len()],
                    unmatched: vec![0; tariffs.len()],
                });
            acc.hours += 1;
            acc.usage = acc
                .usage
                .checked_add(reading.hourly_usage)
                .ok_or_else(|| overflow("total usage"))?;
            let date = reading.local_date();
            acc.months.insert((date.year(), date.month()));

            for (i, tariff) in tariffs.iter().enumerate() {
                if let Some(charge) = reading.charge_for(tariff.name()) {
                    acc.energy[i] = acc.energy[i]
                        .checked_add(charge.cost)
                        .ok_or_else(|| overflow("energy cost"))?;
                    if charge.tier.is_none() {
                        acc.unmatched[i] += 1;
                    }
                }
            }
        }

        let mut meters = Vec::with_capacity(per_meter.len());
        for (key, acc) in per_meter {
            let overflow = |quantity| BillingError::Overflow {
                quantity,
                context: key.to_string(),
            };
            let billing_periods = u32::try_from(acc.months.len()).unwrap_or(u32::MAX);
            let mut plans = Vec::with_capacity(tariffs.len());
            for (i, tariff) in tariffs.iter().enumerate() {
                let service_charges = tariff
                    .service_charge()
                    .checked_mul(Decimal::from(billing_periods))
                    .ok_or_else(|| overflow("service charges"))?;
                acc.energy[i]
                    .checked_add(service_charges)
                    .ok_or_else(|| overflow("total cost"))?;
                plans.push(PlanTotals {
                    tariff: tariff.name().to_string(),
                    energy_cost: acc.energy[i],
                    service_charges,
                    unmatched_hours: acc.unmatched[i],
                });
            }
            meters.push(MeterSummary {
                key,
                unit: acc.unit,
                hours: acc.hours,
                usage: acc.usage,
                billing_periods,
                plans,
            });
        }

        Ok(Self { meters })
    }

    /// Total unmatched hours across all meters and tariffs.
    pub fn unmatched_hours(&self) -> usize {
        self.meters
            .iter()
            .flat_map(|m| m.plans.iter())
            .map(|p| p.unmatched_hours)
            .sum()
    }
}
