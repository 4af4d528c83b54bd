//! Billing run: daily accumulation, tariff pricing, and plan comparison.

/// Daily cumulative usage fold.
pub mod accumulator;
pub mod engine;
/// Per-meter plan comparison.
pub mod summary;

pub use engine::{BillingEngine, BillingError, MeterGroup, UnmatchedPolicy, group_by_meter};
pub use summary::{BillSummary, MeterSummary, PlanTotals};
