//! Seeded synthetic hourly usage for demos and tests.

use chrono::{DateTime, Days, NaiveDate, TimeDelta, TimeZone, Timelike};
use chrono_tz::Tz;
use rand::{Rng, SeedableRng, rngs::StdRng};
use rust_decimal::Decimal;

use crate::reading::Reading;

/// Residential hourly usage with an evening peak.
///
/// Usage follows `base + amp * sin(2π·hour/24 + phase)` plus Gaussian
/// noise, floored at zero and rounded to three decimals like a utility
/// export.
///
/// # Examples
///
/// ```
/// use calc_plans::synth::SyntheticMeter;
/// use chrono::NaiveDate;
///
/// let mut meter = SyntheticMeter::new("100", "M-1", 42);
/// let start = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
/// let readings = meter.readings(start, 2, chrono_tz::America::Detroit);
/// assert_eq!(readings.len(), 48);
/// ```
#[derive(Debug, Clone)]
pub struct SyntheticMeter {
    pub account: String,
    pub meter: String,
    /// Mean hourly usage in kWh.
    pub base_kwh: f64,
    /// Daily swing around the mean in kWh.
    pub amp_kwh: f64,
    /// Phase offset in radians; π puts the peak at 18:00.
    pub phase_rad: f64,
    /// Standard deviation of the noise in kWh.
    pub noise_std: f64,
    rng: StdRng,
}

impl SyntheticMeter {
    /// Creates a meter with the default household profile.
    pub fn new(account: impl Into<String>, meter: impl Into<String>, seed: u64) -> Self {
        Self {
            account: account.into(),
            meter: meter.into(),
            base_kwh: 0.8,
            amp_kwh: 0.7,
            phase_rad: std::f64::consts::PI,
            noise_std: 0.05,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Usage for one hour of the local day.
    pub fn usage_kwh(&mut self, hour: u32) -> Decimal {
        let angle = 2.0 * std::f64::consts::PI * f64::from(hour) / 24.0 + self.phase_rad;

        let noise = if self.noise_std > 0.0 {
            // Box-Muller
            let u1: f64 = self.rng.random::<f64>().clamp(1e-9, 1.0);
            let u2: f64 = self.rng.random::<f64>();
            (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos() * self.noise_std
        } else {
            0.0
        };

        let kwh = (self.base_kwh + self.amp_kwh * angle.sin() + noise).max(0.0);
        Decimal::try_from(kwh).unwrap_or(Decimal::ZERO).round_dp(3)
    }

    /// One reading per elapsed hour from local midnight of `start` through
    /// the end of the last day, so DST days have 23 or 25 readings.
    pub fn readings(&mut self, start: NaiveDate, days: u64, tz: Tz) -> Vec<Reading> {
        let first = local_midnight(start, tz);
        let end = local_midnight(start + Days::new(days), tz);

        let mut readings = Vec::new();
        let mut ts = first;
        while ts < end {
            let usage = self.usage_kwh(ts.hour());
            readings.push(Reading::new(
                self.account.clone(),
                self.meter.clone(),
                ts,
                usage,
                "kWh",
            ));
            ts = ts + TimeDelta::hours(1);
        }
        readings
    }
}

fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Tz> {
    let naive = date.and_time(chrono::NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}
