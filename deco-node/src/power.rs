//! # Power Model
//!
//! Node policies and their power draw, plus the battery and harvest limits
//! every simulated node shares.

use deco_error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Battery capacity used when nothing else is configured (Joules).
pub const DEFAULT_MAX_CAPACITY_JOULES: f64 = 3600.0;

/// Maximum harvested power at full ambient potential (Joules per second).
pub const DEFAULT_HARVEST_RATE_MAX: f64 = 0.005;

/// What a node is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Policy {
    /// Ultra-low power deep sleep
    #[default]
    Sleep,
    /// Radio listening for a wake-up signal
    WakeListen,
    /// Low-fidelity sensing (basic temperature)
    SenseLow,
    /// High-fidelity sensing (full environmental scan)
    SenseHigh,
    /// Radio transmission
    Transmit,
}

impl Policy {
    pub const ALL: [Policy; 5] = [
        Policy::Sleep,
        Policy::WakeListen,
        Policy::SenseLow,
        Policy::SenseHigh,
        Policy::Transmit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::Sleep => "SLEEP",
            Policy::WakeListen => "WAKE_LISTEN",
            Policy::SenseLow => "SENSE_LOW",
            Policy::SenseHigh => "SENSE_HIGH",
            Policy::Transmit => "TRANSMIT",
        }
    }

    /// Whether the node is actively collecting data under this policy
    pub fn is_sensing(&self) -> bool {
        matches!(self, Policy::SenseLow | Policy::SenseHigh)
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Policy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Policy::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| Error::invalid_policy(s).with_operation("policy::parse"))
    }
}

/// Power draw in Watts for each policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default, deny_unknown_fields)]
pub struct PowerTable {
    pub sleep: f64,
    pub wake_listen: f64,
    pub sense_low: f64,
    pub sense_high: f64,
    pub transmit: f64,
}

impl Default for PowerTable {
    fn default() -> Self {
        Self {
            sleep: 0.00001,
            wake_listen: 0.05,
            sense_low: 0.02,
            sense_high: 0.15,
            transmit: 0.25,
        }
    }
}

impl PowerTable {
    /// Power draw (W) of the given policy
    pub fn draw(&self, policy: Policy) -> f64 {
        match policy {
            Policy::Sleep => self.sleep,
            Policy::WakeListen => self.wake_listen,
            Policy::SenseLow => self.sense_low,
            Policy::SenseHigh => self.sense_high,
            Policy::Transmit => self.transmit,
        }
    }
}

/// Energy limits shared by all nodes of a network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnergyModel {
    pub power: PowerTable,
    /// Harvested power at `harvest_potential == 1.0` (J/s)
    pub harvest_rate_max: f64,
    /// Battery capacity (J)
    pub max_capacity_joules: f64,
}

impl Default for EnergyModel {
    fn default() -> Self {
        Self {
            power: PowerTable::default(),
            harvest_rate_max: DEFAULT_HARVEST_RATE_MAX,
            max_capacity_joules: DEFAULT_MAX_CAPACITY_JOULES,
        }
    }
}

impl EnergyModel {
    /// Reject negative, NaN or infinite values and a zero capacity.
    pub fn validate(&self) -> Result<()> {
        let check = |name: &'static str, value: f64| -> Result<()> {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::config_invalid(format!(
                    "{} must be a finite, non-negative number (got {})",
                    name, value
                ))
                .with_operation("energy_model::validate")
                .with_context("field", name));
            }
            Ok(())
        };

        for policy in Policy::ALL {
            check(policy.as_str(), self.power.draw(policy))?;
        }
        check("harvest_rate_max", self.harvest_rate_max)?;
        check("max_capacity_joules", self.max_capacity_joules)?;

        if self.max_capacity_joules <= 0.0 {
            return Err(Error::config_invalid("max_capacity_joules must be greater than zero")
                .with_operation("energy_model::validate"));
        }
        Ok(())
    }
}
