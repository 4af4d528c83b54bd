//! TOML-based plan configuration and the built-in plan presets.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chrono_tz::Tz;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::billing::UnmatchedPolicy;
use crate::tariff::{Comparison, MonthDay, RateCondition, RateTier, Tariff, TariffError, Window};

/// Zone the utility reports hourly readings in.
pub const DEFAULT_TIME_ZONE: &str = "America/Detroit";

/// Top-level plan configuration parsed from TOML.
///
/// Load from TOML with [`PlanConfig::from_toml_file`] or use
/// [`PlanConfig::dte`] for the built-in residential plans.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanConfig {
    /// Run-wide settings.
    #[serde(default)]
    pub billing: BillingConfig,
    /// Tariffs in output column order.
    #[serde(default)]
    pub tariffs: Vec<TariffConfig>,
}

/// Run-wide settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BillingConfig {
    /// IANA zone used to parse timestamps and find day boundaries.
    pub time_zone: String,
    /// `"warn"` (default) or `"fail"`.
    pub on_unmatched: UnmatchedPolicy,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            on_unmatched: UnmatchedPolicy::Warn,
        }
    }
}

/// One tariff.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TariffConfig {
    pub name: String,
    /// Fixed charge per billing period, in currency units.
    #[serde(default)]
    pub service_charge: Decimal,
    /// Tiers in priority order.
    #[serde(default)]
    pub tiers: Vec<TierConfig>,
}

/// One rate tier; charges are in minor units per unit of energy.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierConfig {
    pub name: String,
    pub distribution: Decimal,
    pub capacity: Decimal,
    pub non_capacity: Decimal,
    #[serde(default)]
    pub conditions: Vec<ConditionConfig>,
}

/// One condition. `key` and `description` default to the window's own.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionConfig {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub when: Window,
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"tariffs[1].tiers"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validated, ready-to-run configuration.
#[derive(Debug, Clone)]
pub struct BillingSetup {
    pub tariffs: Vec<Tariff>,
    pub time_zone: Tz,
    pub on_unmatched: UnmatchedPolicy,
}

impl ConditionConfig {
    fn to_condition(&self) -> RateCondition {
        let mut condition = RateCondition::new(self.when.clone());
        if let Some(key) = &self.key {
            condition = condition.with_key(key.clone());
        }
        if let Some(description) = &self.description {
            condition = condition.with_description(description.clone());
        }
        condition
    }
}

impl TierConfig {
    fn to_tier(&self) -> RateTier {
        self.conditions.iter().fold(
            RateTier::new(
                self.name.clone(),
                self.distribution,
                self.capacity,
                self.non_capacity,
            ),
            |tier, c| tier.when(c.to_condition()),
        )
    }
}

impl TariffConfig {
    /// Builds the domain tariff.
    ///
    /// # Errors
    ///
    /// Propagates [`Tariff::new`] construction errors.
    pub fn to_tariff(&self) -> Result<Tariff, TariffError> {
        Tariff::new(
            self.name.clone(),
            self.service_charge,
            self.tiers.iter().map(TierConfig::to_tier).collect(),
        )
    }
}

impl PlanConfig {
    /// Available preset names.
    pub const PRESETS: &[&str] = &["dte"];

    /// DTE Electric residential plans: D1 (tiered), D1.2 (seasonal
    /// time-of-day), D1.9 (dynamic peak), and D1.8 (dedicated EV meter).
    pub fn dte() -> Self {
        let summer = || calendar((6, 1), (10, 31));
        let winter = || calendar((11, 1), (5, 31));
        let weekdays = || weekday_range(0, 4);
        let weekend = || weekday_range(5, 6);

        Self {
            billing: BillingConfig::default(),
            tariffs: vec![
                TariffConfig {
                    name: "D1".to_string(),
                    service_charge: dec!(7.50),
                    tiers: vec![
                        tier(
                            "First 17kWh",
                            [dec!(6.611), dec!(4.500), dec!(4.176)],
                            vec![threshold(Comparison::AtMost, dec!(17))],
                        ),
                        tier(
                            "After 17kWh",
                            [dec!(6.611), dec!(6.484), dec!(4.176)],
                            vec![threshold(Comparison::Above, dec!(17))],
                        ),
                    ],
                },
                TariffConfig {
                    name: "D1.2".to_string(),
                    service_charge: dec!(7.50),
                    tiers: vec![
                        tier(
                            "Time-of-Day Summer Off-Peak",
                            [dec!(6.611), dec!(1.160), dec!(4.261)],
                            vec![summer(), hour_range(19, 10)],
                        ),
                        tier(
                            "Time-of-Day Summer On-Peak",
                            [dec!(6.611), dec!(11.841), dec!(4.261)],
                            vec![summer(), hour_range(11, 18)],
                        ),
                        tier(
                            "Time-of-Day Winter Off-Peak",
                            [dec!(6.611), dec!(0.948), dec!(4.261)],
                            vec![winter(), hour_range(19, 10)],
                        ),
                        tier(
                            "Time-of-Day Winter On-Peak",
                            [dec!(6.611), dec!(9.341), dec!(4.261)],
                            vec![winter(), hour_range(11, 18)],
                        ),
                    ],
                },
                TariffConfig {
                    name: "D1.9".to_string(),
                    service_charge: dec!(7.50),
                    tiers: vec![
                        tier(
                            "Dynamic Mid-Peak",
                            [dec!(6.611), dec!(5.645), dec!(3.576)],
                            vec![
                                weekdays(),
                                condition(Window::Any {
                                    of: vec![
                                        Window::Hours { start: 19, end: 22 },
                                        Window::Hours { start: 7, end: 14 },
                                    ],
                                }),
                            ],
                        ),
                        tier(
                            "Dynamic On-Peak",
                            [dec!(6.611), dec!(13.025), dec!(3.576)],
                            vec![weekdays(), hour_range(15, 18)],
                        ),
                        tier(
                            "Dynamic Off-Peak Weekday",
                            [dec!(6.611), dec!(1.218), dec!(3.576)],
                            vec![weekdays(), hour_range(23, 6)],
                        ),
                        tier(
                            "Dynamic Off-Peak Weekend",
                            [dec!(6.611), dec!(1.218), dec!(3.576)],
                            vec![weekend()],
                        ),
                    ],
                },
                TariffConfig {
                    name: "D1.8".to_string(),
                    service_charge: dec!(1.95),
                    tiers: vec![
                        tier(
                            "EV On-Peak",
                            [dec!(6.611), dec!(9.791), dec!(19.720)],
                            vec![weekdays(), hour_range(9, 22)],
                        ),
                        tier(
                            "EV Off-Peak Weekday",
                            [dec!(6.611), dec!(2.448), dec!(7.889)],
                            vec![weekdays(), hour_range(23, 8)],
                        ),
                        tier(
                            "EV Off-Peak Weekend",
                            [dec!(6.611), dec!(2.448), dec!(7.889)],
                            vec![weekend()],
                        ),
                    ],
                },
            ],
        }
    }

    /// Loads plans from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "dte" => Ok(Self::dte()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses plans from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("plans", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses plans from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Resolves the configured time zone.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` for names outside the IANA database.
    pub fn time_zone(&self) -> Result<Tz, ConfigError> {
        self.billing.time_zone.parse::<Tz>().map_err(|_| {
            ConfigError::new(
                "billing.time_zone",
                format!("unknown time zone \"{}\"", self.billing.time_zone),
            )
        })
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if let Err(e) = self.time_zone() {
            errors.push(e);
        }

        if self.tariffs.is_empty() {
            errors.push(ConfigError::new("tariffs", "must define at least one tariff"));
        }

        let mut names = HashSet::new();
        for (i, tariff) in self.tariffs.iter().enumerate() {
            let path = format!("tariffs[{i}]");
            if tariff.name.trim().is_empty() {
                errors.push(ConfigError::new(format!("{path}.name"), "must not be empty"));
            } else if !names.insert(tariff.name.as_str()) {
                errors.push(ConfigError::new(
                    format!("{path}.name"),
                    format!("duplicate tariff name \"{}\"", tariff.name),
                ));
            }
            if tariff.service_charge < Decimal::ZERO {
                errors.push(ConfigError::new(
                    format!("{path}.service_charge"),
                    "must be >= 0",
                ));
            }
            if tariff.tiers.is_empty() {
                errors.push(ConfigError::new(
                    format!("{path}.tiers"),
                    "must define at least one tier",
                ));
            }

            for (j, tier) in tariff.tiers.iter().enumerate() {
                let tier_path = format!("{path}.tiers[{j}]");
                if tier.name.trim().is_empty() {
                    errors.push(ConfigError::new(format!("{tier_path}.name"), "must not be empty"));
                }
                for (field, value) in [
                    ("distribution", tier.distribution),
                    ("capacity", tier.capacity),
                    ("non_capacity", tier.non_capacity),
                ] {
                    if value < Decimal::ZERO {
                        errors.push(ConfigError::new(format!("{tier_path}.{field}"), "must be >= 0"));
                    }
                }
                for (k, condition) in tier.conditions.iter().enumerate() {
                    if let Err(e) = condition.when.validate() {
                        errors.push(ConfigError::new(
                            format!("{tier_path}.conditions[{k}].when"),
                            e.to_string(),
                        ));
                    }
                }
            }
        }

        errors
    }

    /// Validates and builds the run setup.
    ///
    /// # Errors
    ///
    /// Returns every validation error at once.
    pub fn build(&self) -> Result<BillingSetup, Vec<ConfigError>> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(errors);
        }
        let time_zone = self.time_zone().map_err(|e| vec![e])?;
        let tariffs = self
            .tariffs
            .iter()
            .enumerate()
            .map(|(i, t)| {
                t.to_tariff()
                    .map_err(|e| ConfigError::new(format!("tariffs[{i}]"), e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| vec![e])?;
        Ok(BillingSetup {
            tariffs,
            time_zone,
            on_unmatched: self.billing.on_unmatched,
        })
    }
}

fn condition(when: Window) -> ConditionConfig {
    ConditionConfig {
        key: None,
        description: None,
        when,
    }
}

fn threshold(op: Comparison, limit: Decimal) -> ConditionConfig {
    condition(Window::Threshold { op, limit })
}

fn hour_range(start: u32, end: u32) -> ConditionConfig {
    condition(Window::Hours { start, end })
}

fn weekday_range(start: u32, end: u32) -> ConditionConfig {
    condition(Window::Weekdays { start, end })
}

fn calendar((start_month, start_day): (u32, u32), (end_month, end_day): (u32, u32)) -> ConditionConfig {
    condition(Window::Calendar {
        start: MonthDay::from_parts(start_month, start_day),
        end: MonthDay::from_parts(end_month, end_day),
    })
}

fn tier(name: &str, charges: [Decimal; 3], conditions: Vec<ConditionConfig>) -> TierConfig {
    let [distribution, capacity, non_capacity] = charges;
    TierConfig {
        name: name.to_string(),
        distribution,
        capacity,
        non_capacity,
        conditions,
    }
}
