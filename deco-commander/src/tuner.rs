//! Parameter tuning - the numeric half of a wake command.

use crate::command::{BoParameters, SensePolicy};
use deco_error::{Error, Result};
use deco_node::NodeTelemetry;
use serde::{Deserialize, Serialize};

/// Chooses sampling interval and TX power for a node about to be woken.
pub trait ParameterTuner: Send + Sync {
    fn suggest(&self, node: &NodeTelemetry, policy: SensePolicy) -> BoParameters;
}

/// Optimised settings per sensing policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TuningPresets {
    /// Aggressive settings, maximising data quality
    pub sense_high: BoParameters,
    /// Conservative settings
    pub sense_low: BoParameters,
}

impl Default for TuningPresets {
    fn default() -> Self {
        Self {
            sense_high: BoParameters::new(5.0, 10.0),
            sense_low: BoParameters::new(30.0, 5.0),
        }
    }
}

impl TuningPresets {
    pub fn validate(&self) -> Result<()> {
        for (name, params) in [("sense_high", &self.sense_high), ("sense_low", &self.sense_low)] {
            if !params.sampling_interval_s.is_finite()
                || params.sampling_interval_s <= 0.0
                || !params.tx_power_dbm.is_finite()
            {
                return Err(Error::config_invalid(format!(
                    "tuning preset {} needs a positive sampling interval and finite tx power",
                    name
                ))
                .with_operation("tuning::validate")
                .with_context("preset", name));
            }
        }
        Ok(())
    }
}

/// Returns the configured preset for the chosen policy.
#[derive(Debug, Clone, Default)]
pub struct PresetTuner {
    presets: TuningPresets,
}

impl PresetTuner {
    pub fn new(presets: TuningPresets) -> Self {
        Self { presets }
    }
}

impl ParameterTuner for PresetTuner {
    fn suggest(&self, _node: &NodeTelemetry, policy: SensePolicy) -> BoParameters {
        match policy {
            SensePolicy::SenseHigh => self.presets.sense_high,
            SensePolicy::SenseLow => self.presets.sense_low,
        }
    }
}
