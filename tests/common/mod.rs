//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use calc_plans::config::PlanConfig;
use calc_plans::reading::Reading;
use calc_plans::tariff::Tariff;
use chrono::TimeZone;
use chrono_tz::America::Detroit;
use rust_decimal::Decimal;

/// The built-in DTE tariffs, validated.
pub fn dte_tariffs() -> Vec<Tariff> {
    PlanConfig::dte()
        .build()
        .expect("dte preset should build")
        .tariffs
}

/// Unbilled reading at a Detroit local hour that exists exactly once.
pub fn reading(meter: &str, y: i32, m: u32, d: u32, h: u32, usage: Decimal) -> Reading {
    let ts = Detroit
        .with_ymd_and_hms(y, m, d, h, 0, 0)
        .single()
        .expect("unambiguous local time");
    Reading::new("100", meter, ts, usage, "kWh")
}

/// Path to a file under `tests/fixtures`.
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Tier names a billed reading resolved to, in tariff order.
pub fn tiers_of(reading: &Reading) -> Vec<Option<&str>> {
    reading.charges.iter().map(|c| c.tier.as_deref()).collect()
}
