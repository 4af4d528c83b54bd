//! Rate tiers: per-unit charges guarded by an AND of conditions.

use rust_decimal::Decimal;

use crate::reading::Reading;

use super::condition::RateCondition;

/// A tier cost that does not fit in a [`Decimal`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cost of {usage} at {unit_charge} per unit overflows")]
pub struct CostOverflow {
    pub usage: Decimal,
    pub unit_charge: Decimal,
}

/// A named sub-rate of a tariff.
///
/// Charges are in currency minor units (cents) per unit of energy. A tier
/// with no conditions applies to every reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateTier {
    /// Tier name written to the output (e.g. `First 17kWh`).
    pub name: String,
    /// Distribution charge per unit.
    pub distribution: Decimal,
    /// Capacity charge per unit.
    pub capacity: Decimal,
    /// Non-capacity charge per unit.
    pub non_capacity: Decimal,
    /// Conditions, all of which must hold.
    pub conditions: Vec<RateCondition>,
}

impl RateTier {
    /// Creates an unconditional tier.
    pub fn new(
        name: impl Into<String>,
        distribution: Decimal,
        capacity: Decimal,
        non_capacity: Decimal,
    ) -> Self {
        Self {
            name: name.into(),
            distribution,
            capacity,
            non_capacity,
            conditions: Vec::new(),
        }
    }

    /// Appends a condition.
    #[must_use]
    pub fn when(mut self, condition: RateCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Sum of the three per-unit components, in minor units.
    ///
    /// `None` if the sum overflows; [`Tariff::new`](super::Tariff::new)
    /// rejects such tiers.
    pub fn unit_charge(&self) -> Option<Decimal> {
        self.distribution
            .checked_add(self.capacity)?
            .checked_add(self.non_capacity)
    }

    /// Whether every condition holds for `reading`.
    pub fn applies(&self, reading: &Reading) -> bool {
        self.check(reading, false)
    }

    /// Like [`applies`](Self::applies), optionally logging failures.
    ///
    /// With diagnostics on every condition is evaluated, so each failing
    /// one is reported rather than only the first.
    pub fn check(&self, reading: &Reading, diagnostics: bool) -> bool {
        if diagnostics {
            self.conditions
                .iter()
                .fold(true, |all, c| c.evaluate(reading, true) && all)
        } else {
            self.conditions.iter().all(|c| c.evaluate(reading, false))
        }
    }

    /// Cost of the reading under this tier, in currency units.
    ///
    /// Zero when the tier does not apply, otherwise
    /// `hourly_usage * unit_charge / 100`.
    ///
    /// # Errors
    ///
    /// Returns [`CostOverflow`] when the product does not fit in a
    /// [`Decimal`].
    pub fn cost(&self, reading: &Reading) -> Result<Decimal, CostOverflow> {
        if !self.applies(reading) {
            return Ok(Decimal::ZERO);
        }
        let usage = reading.hourly_usage;
        let overflow = |unit_charge| CostOverflow { usage, unit_charge };
        let unit_charge = self.unit_charge().ok_or(overflow(Decimal::MAX))?;
        usage
            .checked_mul(unit_charge)
            .and_then(|c| c.checked_div(Decimal::ONE_HUNDRED))
            .ok_or(overflow(unit_charge))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono_tz::America::Detroit;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::tariff::window::{Comparison, Window};

    fn reading(usage: Decimal, cumulative: Decimal, hour: u32) -> Reading {
        let ts = Detroit
            .with_ymd_and_hms(2024, 7, 10, hour, 0, 0)
            .single()
            .expect("unambiguous local time");
        let mut r = Reading::new("a", "m", ts, usage, "kWh");
        r.daily_cumulative = cumulative;
        r
    }

    fn first_17() -> RateTier {
        RateTier::new("First 17kWh", dec!(6.611), dec!(4.500), dec!(4.176)).when(
            RateCondition::new(Window::Threshold {
                op: Comparison::AtMost,
                limit: dec!(17),
            }),
        )
    }

    #[test]
    fn cost_formula_is_exact() {
        let tier = first_17();
        let r = reading(dec!(2.5), dec!(2.5), 12);
        assert_eq!(tier.unit_charge(), Some(dec!(15.287)));
        assert_eq!(tier.cost(&r), Ok(dec!(0.382175)));
    }

    #[test]
    fn cost_is_zero_when_not_applicable() {
        let tier = first_17();
        let r = reading(dec!(2.5), dec!(20), 12);
        assert!(!tier.applies(&r));
        assert_eq!(tier.cost(&r), Ok(Decimal::ZERO));
    }

    #[test]
    fn oversized_usage_is_an_error() {
        let tier = first_17();
        let r = reading(Decimal::MAX, dec!(1), 12);
        assert_eq!(
            tier.cost(&r),
            Err(CostOverflow {
                usage: Decimal::MAX,
                unit_charge: dec!(15.287),
            })
        );
        // Still fine when the tier does not apply.
        let r = reading(Decimal::MAX, dec!(20), 12);
        assert_eq!(tier.cost(&r), Ok(Decimal::ZERO));
    }

    #[test]
    fn all_conditions_must_hold() {
        let tier = first_17().when(RateCondition::new(Window::Hours { start: 11, end: 18 }));
        assert!(tier.applies(&reading(dec!(1), dec!(5), 12)));
        assert!(!tier.applies(&reading(dec!(1), dec!(5), 20)));
        assert!(!tier.applies(&reading(dec!(1), dec!(18), 12)));
    }

    #[test]
    fn unconditional_tier_applies_everywhere() {
        let tier = RateTier::new("Flat", dec!(1), dec!(0), dec!(0));
        assert!(tier.applies(&reading(dec!(1), dec!(100), 3)));
    }

    #[test]
    fn diagnostic_check_agrees_with_applies() {
        let tier = first_17().when(RateCondition::new(Window::Hours { start: 11, end: 18 }));
        for (cumulative, hour) in [(dec!(5), 12), (dec!(18), 12), (dec!(18), 20), (dec!(5), 20)] {
            let r = reading(dec!(1), cumulative, hour);
            assert_eq!(tier.check(&r, true), tier.applies(&r));
        }
    }
}
