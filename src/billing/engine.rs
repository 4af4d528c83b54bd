//! Billing engine: groups readings per meter, accumulates daily usage, and
//! prices every reading under every tariff.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::reading::{MeterKey, Reading};
use crate::tariff::Tariff;

use super::accumulator::accumulate_daily;

/// What to do when a tariff has no tier for a reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedPolicy {
    /// Log diagnostics, record no tier and a zero cost, keep going.
    #[default]
    Warn,
    /// Abort the run.
    Fail,
}

/// Billing run failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BillingError {
    #[error("duplicate tariff name \"{0}\"")]
    DuplicateTariff(String),
    #[error("tariff \"{tariff}\" has no rate for {reading}")]
    Unmatched { tariff: String, reading: String },
    /// A total or cost does not fit in a `Decimal`.
    #[error("{quantity} overflows at {context}")]
    Overflow {
        quantity: &'static str,
        context: String,
    },
}

/// All readings of one meter, owned and independent of other meters.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterGroup {
    pub key: MeterKey,
    pub readings: Vec<Reading>,
}

/// Splits readings into per-meter groups ordered by (account, meter).
///
/// Within a group readings keep their input order.
pub fn group_by_meter(readings: Vec<Reading>) -> Vec<MeterGroup> {
    let mut groups: BTreeMap<MeterKey, Vec<Reading>> = BTreeMap::new();
    for reading in readings {
        groups.entry(reading.meter_key()).or_default().push(reading);
    }
    groups
        .into_iter()
        .map(|(key, readings)| MeterGroup { key, readings })
        .collect()
}

/// Prices meter readings under a fixed, ordered set of tariffs.
///
/// Tariffs are read-only for the life of the engine; the only mutable
/// state of a run is each meter's daily tally.
#[derive(Debug, Clone)]
pub struct BillingEngine {
    tariffs: Vec<Tariff>,
    policy: UnmatchedPolicy,
}

impl BillingEngine {
    /// Creates an engine with the [`UnmatchedPolicy::Warn`] policy.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::DuplicateTariff`] if two tariffs share a name,
    /// since names key the output columns.
    pub fn new(tariffs: Vec<Tariff>) -> Result<Self, BillingError> {
        let mut seen = HashSet::new();
        for tariff in &tariffs {
            if !seen.insert(tariff.name()) {
                return Err(BillingError::DuplicateTariff(tariff.name().to_string()));
            }
        }
        Ok(Self {
            tariffs,
            policy: UnmatchedPolicy::default(),
        })
    }

    #[must_use]
    pub fn with_policy(mut self, policy: UnmatchedPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn tariffs(&self) -> &[Tariff] {
        &self.tariffs
    }

    pub fn policy(&self) -> UnmatchedPolicy {
        self.policy
    }

    /// Bills a full input set.
    ///
    /// Output is grouped by (account, meter) in key order and is
    /// chronological within each group.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::Overflow`] on the first reading whose daily
    /// total or cost overflows, and under [`UnmatchedPolicy::Fail`] on the
    /// first reading a tariff cannot price.
    pub fn run(&self, readings: Vec<Reading>) -> Result<Vec<Reading>, BillingError> {
        let total = readings.len();
        let groups = group_by_meter(readings);
        tracing::info!(
            readings = total,
            meters = groups.len(),
            tariffs = self.tariffs.len(),
            "billing run started"
        );

        let mut billed = Vec::with_capacity(total);
        for group in groups {
            billed.extend(self.bill_group(group)?);
        }
        Ok(billed)
    }

    /// Bills one meter: stable sort, daily accumulation, then pricing.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub fn bill_group(&self, group: MeterGroup) -> Result<Vec<Reading>, BillingError> {
        let MeterGroup { key, mut readings } = group;
        // Stable: equal timestamps (DST fall-back) keep input order.
        readings.sort_by_key(|r| r.timestamp);
        accumulate_daily(&mut readings)?;

        for reading in &mut readings {
            self.price(reading)?;
        }

        tracing::debug!(%key, readings = readings.len(), "meter billed");
        Ok(readings)
    }

    /// Replaces the reading's charges with one entry per tariff.
    fn price(&self, reading: &mut Reading) -> Result<(), BillingError> {
        let mut charges = Vec::with_capacity(self.tariffs.len());
        for tariff in &self.tariffs {
            let charge = tariff.price(reading).map_err(|e| BillingError::Overflow {
                quantity: "cost",
                context: format!("tariff \"{}\", {reading}: {e}", tariff.name()),
            })?;
            if charge.tier.is_none() && self.policy == UnmatchedPolicy::Fail {
                return Err(BillingError::Unmatched {
                    tariff: tariff.name().to_string(),
                    reading: reading.to_string(),
                });
            }
            charges.push(charge);
        }
        reading.charges = charges;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono_tz::America::Detroit;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::tariff::{Comparison, RateCondition, RateTier, Window};

    fn reading(account: &str, meter: &str, d: u32, h: u32, usage: Decimal) -> Reading {
        let ts = Detroit
            .with_ymd_and_hms(2024, 1, d, h, 0, 0)
            .single()
            .expect("unambiguous local time");
        Reading::new(account, meter, ts, usage, "kWh")
    }

    fn d1() -> Tariff {
        Tariff::new(
            "D1",
            dec!(7.50),
            vec![
                RateTier::new("First 17kWh", dec!(6.611), dec!(4.500), dec!(4.176)).when(
                    RateCondition::new(Window::Threshold {
                        op: Comparison::AtMost,
                        limit: dec!(17),
                    }),
                ),
                RateTier::new("After 17kWh", dec!(6.611), dec!(6.484), dec!(4.176)).when(
                    RateCondition::new(Window::Threshold {
                        op: Comparison::Above,
                        limit: dec!(17),
                    }),
                ),
            ],
        )
        .expect("valid tariff")
    }

    fn night_only() -> Tariff {
        Tariff::new(
            "Night",
            dec!(1),
            vec![
                RateTier::new("Night", dec!(1), dec!(1), dec!(1))
                    .when(RateCondition::new(Window::Hours { start: 23, end: 5 })),
            ],
        )
        .expect("valid tariff")
    }

    #[test]
    fn groups_are_keyed_and_ordered() {
        let groups = group_by_meter(vec![
            reading("2", "b", 1, 0, dec!(1)),
            reading("1", "z", 1, 0, dec!(1)),
            reading("2", "a", 1, 0, dec!(1)),
            reading("1", "z", 1, 1, dec!(1)),
        ]);
        let keys: Vec<(&str, &str)> = groups
            .iter()
            .map(|g| (g.key.account.as_str(), g.key.meter.as_str()))
            .collect();
        assert_eq!(keys, vec![("1", "z"), ("2", "a"), ("2", "b")]);
        assert_eq!(groups[0].readings.len(), 2);
    }

    #[test]
    fn sorts_accumulates_and_prices() {
        let engine = BillingEngine::new(vec![d1()]).expect("unique names");
        let billed = engine
            .run(vec![
                reading("1", "m", 2, 0, dec!(3)),
                reading("1", "m", 1, 5, dec!(5)),
                reading("1", "m", 1, 4, dec!(10)),
            ])
            .expect("warn policy never fails");

        let cumulative: Vec<Decimal> = billed.iter().map(|r| r.daily_cumulative).collect();
        assert_eq!(cumulative, vec![dec!(10), dec!(15), dec!(3)]);
        assert!(billed.iter().all(|r| r.charges.len() == 1));
        assert_eq!(
            billed[0].charge_for("D1").and_then(|c| c.tier.as_deref()),
            Some("First 17kWh")
        );
        assert_eq!(
            billed[0].charge_for("D1").map(|c| c.cost),
            Some(dec!(10) * dec!(15.287) / dec!(100))
        );
    }

    #[test]
    fn crossing_threshold_changes_tier() {
        let engine = BillingEngine::new(vec![d1()]).expect("unique names");
        let billed = engine
            .run(vec![
                reading("1", "m", 3, 0, dec!(17)),
                reading("1", "m", 3, 1, dec!(0.0001)),
            ])
            .expect("warn policy never fails");
        let tiers: Vec<Option<&str>> = billed
            .iter()
            .map(|r| r.charges[0].tier.as_deref())
            .collect();
        assert_eq!(tiers, vec![Some("First 17kWh"), Some("After 17kWh")]);
    }

    #[test]
    fn unmatched_warns_and_continues_by_default() {
        let engine = BillingEngine::new(vec![night_only(), d1()]).expect("unique names");
        let billed = engine
            .run(vec![reading("1", "m", 4, 12, dec!(2))])
            .expect("warn policy never fails");
        let charges = &billed[0].charges;
        assert_eq!(charges[0].tier, None);
        assert_eq!(charges[0].cost, Decimal::ZERO);
        assert_eq!(charges[1].tier.as_deref(), Some("First 17kWh"));
    }

    #[test]
    fn unmatched_fails_under_strict_policy() {
        let engine = BillingEngine::new(vec![night_only()])
            .expect("unique names")
            .with_policy(UnmatchedPolicy::Fail);
        let err = engine
            .run(vec![reading("1", "m", 4, 12, dec!(2))])
            .expect_err("noon is outside the only tier");
        assert!(matches!(err, BillingError::Unmatched { ref tariff, .. } if tariff == "Night"));
    }

    #[test]
    fn oversized_usage_fails_instead_of_panicking() {
        let engine = BillingEngine::new(vec![d1()]).expect("unique names");
        let err = engine
            .run(vec![reading("1", "m", 5, 1, Decimal::MAX)])
            .expect_err("usage times rate overflows");
        assert!(matches!(err, BillingError::Overflow { quantity: "cost", .. }));
        assert!(err.to_string().contains("D1"), "{err}");

        let err = engine
            .run(vec![
                reading("1", "m", 5, 1, Decimal::MAX),
                reading("1", "m", 5, 2, Decimal::MAX),
            ])
            .expect_err("daily total overflows first");
        assert!(matches!(
            err,
            BillingError::Overflow { quantity: "daily cumulative usage", .. }
        ));
    }

    #[test]
    fn duplicate_tariff_names_are_rejected() {
        let err = BillingEngine::new(vec![d1(), d1()]).expect_err("duplicate");
        assert_eq!(err, BillingError::DuplicateTariff("D1".to_string()));
    }

    #[test]
    fn empty_input_is_not_an_error() {
        let engine = BillingEngine::new(vec![d1()]).expect("unique names");
        assert!(engine.run(Vec::new()).expect("empty run").is_empty());
    }

    #[test]
    fn charges_follow_tariff_order() {
        let engine = BillingEngine::new(vec![night_only(), d1()]).expect("unique names");
        let billed = engine
            .run(vec![reading("1", "m", 4, 23, dec!(1))])
            .expect("warn policy never fails");
        let names: Vec<&str> = billed[0].charges.iter().map(|c| c.tariff.as_str()).collect();
        assert_eq!(names, vec!["Night", "D1"]);
    }
}
