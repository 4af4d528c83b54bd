//! Hourly electricity usage billed under competing tariffs.
//!
//! Readings are grouped per meter, accumulated per local day, and priced
//! under every configured [`tariff::Tariff`] so plans can be compared.

#[cfg(feature = "api")]
pub mod api;
/// Daily accumulation, pricing, and plan comparison.
pub mod billing;
pub mod cli;
pub mod config;
pub mod io;
pub mod observability;
pub mod reading;
pub mod reporting;
pub mod synth;
pub mod tariff;
