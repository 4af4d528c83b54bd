use std::fmt::Write;

use crate::billing::BillSummary;

/// Renders the per-meter plan comparison; the cheapest plan is starred.
pub fn format_summary(summary: &BillSummary) -> String {
    let mut out = String::from("\n--- Plan Comparison ---\n");
    if summary.meters.is_empty() {
        out.push_str("No readings.\n");
        return out;
    }

    for meter in &summary.meters {
        let cheapest = meter.cheapest().map(|p| p.tariff.as_str());
        let _ = writeln!(
            out,
            "{}: {} hours, {} {} over {} billing period(s)",
            meter.key,
            meter.hours,
            meter.usage,
            meter.unit,
            meter.billing_periods
        );
        for plan in &meter.plans {
            let marker = if Some(plan.tariff.as_str()) == cheapest { "*" } else { " " };
            let _ = write!(
                out,
                "  {marker} {:<8} energy ${:>9}  service ${:>7}  total ${:>9}",
                plan.tariff,
                plan.energy_cost.round_dp(2),
                plan.service_charges.round_dp(2),
                plan.total_cost().round_dp(2)
            );
            if plan.unmatched_hours > 0 {
                let _ = write!(out, "  ({} unmatched hours)", plan.unmatched_hours);
            }
            out.push('\n');
        }
    }
    out
}

pub fn print_summary(summary: &BillSummary) {
    print!("{}", format_summary(summary));
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::billing::{MeterSummary, PlanTotals};
    use crate::reading::MeterKey;

    fn plan(name: &str, energy: rust_decimal::Decimal, unmatched: usize) -> PlanTotals {
        PlanTotals {
            tariff: name.to_string(),
            energy_cost: energy,
            service_charges: dec!(7.50),
            unmatched_hours: unmatched,
        }
    }

    fn summary() -> BillSummary {
        BillSummary {
            meters: vec![MeterSummary {
                key: MeterKey {
                    account: "100".to_string(),
                    meter: "M-1".to_string(),
                },
                unit: "kWh".to_string(),
                hours: 48,
                usage: dec!(38.25),
                billing_periods: 1,
                plans: vec![plan("D1", dec!(6.123456), 0), plan("D1.2", dec!(5.004), 2)],
            }],
        }
    }

    #[test]
    fn marks_cheapest_and_rounds_to_cents() {
        let text = format_summary(&summary());
        assert!(text.contains("account 100 meter M-1: 48 hours, 38.25 kWh"));
        let d1 = text.lines().find(|l| l.contains("D1 ")).unwrap_or("");
        let d12 = text.lines().find(|l| l.contains("D1.2")).unwrap_or("");
        assert!(d1.contains("13.62"), "{d1}");
        assert!(d1.trim_start().starts_with("D1"), "{d1}");
        assert!(d12.trim_start().starts_with('*'), "{d12}");
        assert!(d12.contains("12.50"), "{d12}");
        assert!(d12.contains("(2 unmatched hours)"), "{d12}");
    }

    #[test]
    fn empty_summary() {
        assert!(format_summary(&BillSummary::default()).contains("No readings."));
    }
}
