//! Tariffs (price plans): ordered tiers resolved with first-match semantics.

use rust_decimal::Decimal;

use crate::reading::{Reading, TariffCharge};

use super::tier::{CostOverflow, RateTier};

/// Tariff rejected at construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TariffError {
    #[error("tariff \"{0}\" has no rate tiers")]
    NoTiers(String),
    #[error("tariff \"{0}\" has a negative service charge")]
    NegativeServiceCharge(String),
    #[error("tariff \"{tariff}\" tier \"{tier}\" has a negative {component} charge")]
    NegativeCharge {
        tariff: String,
        tier: String,
        component: &'static str,
    },
    #[error("tariff \"{tariff}\" tier \"{tier}\" has a per-unit charge too large to total")]
    ChargeOverflow { tariff: String, tier: String },
}

/// A named pricing plan.
///
/// Tier order is priority order: the first tier whose conditions hold is
/// the one that prices a reading, even when later tiers also hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tariff {
    name: String,
    service_charge: Decimal,
    tiers: Vec<RateTier>,
}

impl Tariff {
    /// Creates a tariff.
    ///
    /// # Errors
    ///
    /// Rejects an empty tier list, negative charges, and tiers whose
    /// components cannot be summed.
    pub fn new(
        name: impl Into<String>,
        service_charge: Decimal,
        tiers: Vec<RateTier>,
    ) -> Result<Self, TariffError> {
        let name = name.into();
        if tiers.is_empty() {
            return Err(TariffError::NoTiers(name));
        }
        if service_charge < Decimal::ZERO {
            return Err(TariffError::NegativeServiceCharge(name));
        }
        for tier in &tiers {
            for (component, value) in [
                ("distribution", tier.distribution),
                ("capacity", tier.capacity),
                ("non-capacity", tier.non_capacity),
            ] {
                if value < Decimal::ZERO {
                    return Err(TariffError::NegativeCharge {
                        tariff: name,
                        tier: tier.name.clone(),
                        component,
                    });
                }
            }
            if tier.unit_charge().is_none() {
                return Err(TariffError::ChargeOverflow {
                    tariff: name,
                    tier: tier.name.clone(),
                });
            }
        }
        Ok(Self {
            name,
            service_charge,
            tiers,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fixed charge per billing period, in currency units.
    pub fn service_charge(&self) -> Decimal {
        self.service_charge
    }

    pub fn tiers(&self) -> &[RateTier] {
        &self.tiers
    }

    /// Returns the first tier, in declared order, that applies to `reading`.
    ///
    /// A miss is a data or configuration problem, not a failure: it is
    /// logged along with every failing condition of every tier, and `None`
    /// is returned.
    pub fn match_tier(&self, reading: &Reading) -> Option<&RateTier> {
        if let Some(tier) = self.tiers.iter().find(|t| t.applies(reading)) {
            return Some(tier);
        }

        tracing::warn!(
            tariff = %self.name,
            "{}: could not find rate for {reading}",
            self.name
        );
        for tier in &self.tiers {
            let span = tracing::warn_span!("recheck", tariff = %self.name, tier = %tier.name);
            let _entered = span.enter();
            tier.check(reading, true);
        }
        None
    }

    /// Cost of `reading` under this tariff; zero when no tier matches.
    ///
    /// # Errors
    ///
    /// Returns [`CostOverflow`] when the matched tier's cost overflows.
    pub fn cost(&self, reading: &Reading) -> Result<Decimal, CostOverflow> {
        self.match_tier(reading)
            .map_or(Ok(Decimal::ZERO), |tier| tier.cost(reading))
    }

    /// Resolves tier and cost with a single match.
    ///
    /// # Errors
    ///
    /// See [`cost`](Self::cost).
    pub fn price(&self, reading: &Reading) -> Result<TariffCharge, CostOverflow> {
        let tier = self.match_tier(reading);
        Ok(TariffCharge {
            tariff: self.name.clone(),
            tier: tier.map(|t| t.name.clone()),
            cost: tier.map_or(Ok(Decimal::ZERO), |t| t.cost(reading))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use chrono::TimeZone;
    use chrono_tz::America::Detroit;
    use rust_decimal_macros::dec;
    use tracing_subscriber::fmt::MakeWriter;

    use super::*;
    use crate::tariff::condition::RateCondition;
    use crate::tariff::window::{Comparison, Window};

    /// Log sink shared between the subscriber and the test.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().expect("log buffer lock")).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("log buffer lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_target(false)
            .finish();
        let result = tracing::subscriber::with_default(subscriber, f);
        (result, logs.text())
    }

    fn reading(usage: Decimal, cumulative: Decimal, hour: u32) -> Reading {
        let ts = Detroit
            .with_ymd_and_hms(2024, 7, 10, hour, 0, 0)
            .single()
            .expect("unambiguous local time");
        let mut r = Reading::new("a", "m", ts, usage, "kWh");
        r.daily_cumulative = cumulative;
        r
    }

    fn threshold(op: Comparison, limit: Decimal) -> RateCondition {
        RateCondition::new(Window::Threshold { op, limit })
    }

    fn d1() -> Tariff {
        Tariff::new(
            "D1",
            dec!(7.50),
            vec![
                RateTier::new("First 17kWh", dec!(6.611), dec!(4.500), dec!(4.176))
                    .when(threshold(Comparison::AtMost, dec!(17))),
                RateTier::new("After 17kWh", dec!(6.611), dec!(6.484), dec!(4.176))
                    .when(threshold(Comparison::Above, dec!(17))),
            ],
        )
        .expect("valid tariff")
    }

    #[test]
    fn resolves_threshold_tiers() {
        let plan = d1();
        let low = reading(dec!(1), dec!(17), 12);
        let high = reading(dec!(1), dec!(17.0001), 12);
        assert_eq!(plan.match_tier(&low).map(|t| t.name.as_str()), Some("First 17kWh"));
        assert_eq!(plan.match_tier(&high).map(|t| t.name.as_str()), Some("After 17kWh"));
    }

    #[test]
    fn first_declared_tier_wins_on_overlap() {
        let plan = Tariff::new(
            "Overlap",
            dec!(0),
            vec![
                RateTier::new("Afternoon", dec!(1), dec!(0), dec!(0))
                    .when(RateCondition::new(Window::Hours { start: 12, end: 18 })),
                RateTier::new("Daytime", dec!(2), dec!(0), dec!(0))
                    .when(RateCondition::new(Window::Hours { start: 8, end: 20 })),
            ],
        )
        .expect("valid tariff");

        let r = reading(dec!(1), dec!(1), 14);
        assert_eq!(plan.match_tier(&r).map(|t| t.name.as_str()), Some("Afternoon"));
        assert_eq!(plan.cost(&r), Ok(dec!(0.01)));

        let morning = reading(dec!(1), dec!(1), 9);
        assert_eq!(plan.match_tier(&morning).map(|t| t.name.as_str()), Some("Daytime"));
    }

    #[test]
    fn no_match_yields_zero_and_none() {
        let plan = Tariff::new(
            "Peak only",
            dec!(1.95),
            vec![
                RateTier::new("Peak", dec!(10), dec!(0), dec!(0))
                    .when(RateCondition::new(Window::Hours { start: 15, end: 18 })),
            ],
        )
        .expect("valid tariff");

        let r = reading(dec!(3), dec!(3), 2);
        assert!(plan.match_tier(&r).is_none());
        assert_eq!(plan.cost(&r), Ok(Decimal::ZERO));

        let charge = plan.price(&r).expect("no tier, no cost");
        assert_eq!(charge.tariff, "Peak only");
        assert_eq!(charge.tier, None);
        assert_eq!(charge.cost, Decimal::ZERO);
    }

    #[test]
    fn miss_logs_reading_and_every_failing_condition() {
        let plan = Tariff::new(
            "Evenings",
            dec!(0),
            vec![
                RateTier::new("Weekend evening", dec!(1), dec!(1), dec!(1))
                    .when(RateCondition::new(Window::Hours { start: 17, end: 21 }))
                    .when(RateCondition::new(Window::Weekdays { start: 5, end: 6 })),
            ],
        )
        .expect("valid tariff");
        // Wednesday noon fails both conditions.
        let r = reading(dec!(1), dec!(1), 12);

        let (tier, logs) = with_captured_logs(|| plan.match_tier(&r).is_some());
        assert!(!tier);

        let lines: Vec<&str> = logs.lines().collect();
        assert_eq!(lines.len(), 3, "{logs}");
        assert!(lines[0].contains("WARN"), "{logs}");
        assert!(
            lines[0].contains(&format!("Evenings: could not find rate for {r}")),
            "{logs}"
        );
        assert!(lines[1..].iter().all(|l| l.contains("recheck")), "{logs}");
        assert!(
            lines[1].contains("no match for Timestamp: 17:00:00 <= hour <= 21:59:59"),
            "{logs}"
        );
        assert!(
            lines[2].contains("no match for Timestamp: Saturday <= day <= Sunday"),
            "{logs}"
        );
    }

    #[test]
    fn match_logs_nothing() {
        let (tier, logs) = with_captured_logs(|| {
            d1().match_tier(&reading(dec!(1), dec!(1), 12))
                .map(|t| t.name.clone())
        });
        assert_eq!(tier.as_deref(), Some("First 17kWh"));
        assert!(logs.is_empty(), "{logs}");
    }

    #[test]
    fn price_matches_cost() {
        let plan = d1();
        let r = reading(dec!(2.5), dec!(20), 12);
        let charge = plan.price(&r).expect("small usage");
        assert_eq!(charge.tier.as_deref(), Some("After 17kWh"));
        assert_eq!(Ok(charge.cost), plan.cost(&r));
        assert_eq!(charge.cost, dec!(2.5) * dec!(17.271) / dec!(100));
    }

    #[test]
    fn empty_tariff_is_rejected() {
        assert_eq!(
            Tariff::new("Empty", dec!(7.50), Vec::new()),
            Err(TariffError::NoTiers("Empty".to_string()))
        );
    }

    #[test]
    fn negative_charges_are_rejected() {
        let err = Tariff::new(
            "Bad",
            dec!(1),
            vec![RateTier::new("T", dec!(1), dec!(-0.5), dec!(0))],
        );
        assert!(matches!(
            err,
            Err(TariffError::NegativeCharge {
                component: "capacity",
                ..
            })
        ));
        assert!(matches!(
            Tariff::new("Bad", dec!(-1), vec![RateTier::new("T", dec!(1), dec!(0), dec!(0))]),
            Err(TariffError::NegativeServiceCharge(_))
        ));
    }

    #[test]
    fn unsummable_charges_are_rejected() {
        let err = Tariff::new(
            "Huge",
            dec!(1),
            vec![RateTier::new("T", Decimal::MAX, Decimal::MAX, dec!(0))],
        );
        assert_eq!(
            err,
            Err(TariffError::ChargeOverflow {
                tariff: "Huge".to_string(),
                tier: "T".to_string(),
            })
        );
    }

    #[test]
    fn oversized_usage_fails_pricing() {
        let r = reading(Decimal::MAX, dec!(1), 12);
        let err = d1().price(&r).expect_err("usage times rate overflows");
        assert_eq!(err.usage, Decimal::MAX);
        assert_eq!(err.unit_charge, dec!(15.287));
    }
}
