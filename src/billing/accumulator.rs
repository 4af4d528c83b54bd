//! Daily cumulative usage as a left fold over one meter's readings.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::reading::Reading;

use super::engine::BillingError;

/// Fold state: the day being tallied and its running total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DailyTally {
    current_date: Option<NaiveDate>,
    running_total: Decimal,
}

impl DailyTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one hour of usage and returns the day's running total.
    ///
    /// The total resets when `date` is strictly later than the day being
    /// tallied. Input must be in ascending date order. Returns `None`, with
    /// the tally left unchanged, when the total would overflow.
    pub fn observe(&mut self, date: NaiveDate, usage: Decimal) -> Option<Decimal> {
        let (current_date, base) = match self.current_date {
            Some(current) if date <= current => (current, self.running_total),
            _ => (date, Decimal::ZERO),
        };
        let total = base.checked_add(usage)?;
        self.current_date = Some(current_date);
        self.running_total = total;
        Some(total)
    }

    pub fn current_date(&self) -> Option<NaiveDate> {
        self.current_date
    }

    pub fn running_total(&self) -> Decimal {
        self.running_total
    }
}

/// Running daily totals for `(date, usage)` pairs in chronological order.
///
/// `None` if any running total overflows.
///
/// # Examples
///
/// ```
/// use calc_plans::billing::accumulator::daily_cumulative;
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
///
/// let d1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let d2 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
/// let totals = daily_cumulative([
///     (d1, Decimal::from(10)),
///     (d1, Decimal::from(5)),
///     (d2, Decimal::from(3)),
/// ]);
/// assert_eq!(
///     totals,
///     Some(vec![Decimal::from(10), Decimal::from(15), Decimal::from(3)])
/// );
/// ```
pub fn daily_cumulative<I>(entries: I) -> Option<Vec<Decimal>>
where
    I: IntoIterator<Item = (NaiveDate, Decimal)>,
{
    let mut tally = DailyTally::new();
    entries
        .into_iter()
        .map(|(date, usage)| tally.observe(date, usage))
        .collect()
}

/// Writes `daily_cumulative` on each reading of one meter's sorted sequence.
///
/// # Errors
///
/// Returns [`BillingError::Overflow`] naming the first reading whose running
/// total does not fit in a [`Decimal`].
pub fn accumulate_daily(readings: &mut [Reading]) -> Result<(), BillingError> {
    let mut tally = DailyTally::new();
    for reading in readings.iter_mut() {
        reading.daily_cumulative = tally
            .observe(reading.local_date(), reading.hourly_usage)
            .ok_or_else(|| BillingError::Overflow {
                quantity: "daily cumulative usage",
                context: reading.to_string(),
            })?;
    }
    Ok(())
}
