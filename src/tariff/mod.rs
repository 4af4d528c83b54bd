//! Tariff model: windows, conditions, tiers, and plans.

/// Rate conditions built from windows.
pub mod condition;
/// Tariffs and first-match tier resolution.
pub mod plan;
pub mod tier;
/// Time-window and threshold predicates.
pub mod window;

pub use condition::RateCondition;
pub use plan::{Tariff, TariffError};
pub use tier::{CostOverflow, RateTier};
pub use window::{Comparison, MonthDay, Window, WindowError};
