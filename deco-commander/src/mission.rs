//! Mission goal and the numeric constraints attached to it.

use deco_error::{Error, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MISSION_GOAL: &str = "Reduce the highest data uncertainty in the network, \
     but do not wake any node with less than 20% battery.";

/// What the operator wants, in words and in numbers.
///
/// The goal text is what a model reads. The thresholds are what the rule
/// planner and the executor enforce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Mission {
    pub goal: String,
    /// Nodes below this battery level are never woken
    pub min_battery_percent: f64,
    /// Act only when the worst eligible uncertainty exceeds this
    pub uncertainty_threshold: f64,
    /// Harvest potential above which SENSE_HIGH is affordable
    pub high_harvest_threshold: f64,
}

impl Default for Mission {
    fn default() -> Self {
        Self {
            goal: DEFAULT_MISSION_GOAL.to_string(),
            min_battery_percent: 20.0,
            uncertainty_threshold: 0.6,
            high_harvest_threshold: 0.7,
        }
    }
}

impl Mission {
    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.goal.trim().is_empty() {
            return Err(Error::config_invalid("mission goal must not be empty")
                .with_operation("mission::validate"));
        }
        if !(0.0..=100.0).contains(&self.min_battery_percent) {
            return Err(Error::config_invalid("min_battery_percent must be within [0, 100]")
                .with_operation("mission::validate"));
        }
        for (name, value) in [
            ("uncertainty_threshold", self.uncertainty_threshold),
            ("high_harvest_threshold", self.high_harvest_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::config_invalid(format!("{} must be within [0, 1]", name))
                    .with_operation("mission::validate")
                    .with_context("field", name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deco_error::ErrorKind;

    #[test]
    fn test_defaults() {
        let mission = Mission::default();
        assert_eq!(mission.min_battery_percent, 20.0);
        assert!(mission.goal.contains("20% battery"));
        assert!(mission.validate().is_ok());
    }

    #[test]
    fn test_partial_config() {
        let mission: Mission = serde_json::from_str(r#"{"min_battery_percent": 35}"#).unwrap();
        assert_eq!(mission.min_battery_percent, 35.0);
        assert_eq!(mission.uncertainty_threshold, 0.6);
    }

    #[test]
    fn test_validation() {
        let mission = Mission {
            uncertainty_threshold: 1.2,
            ..Mission::default()
        };
        let err = mission.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
        assert_eq!(err.context_value("field"), Some("uncertainty_threshold"));

        assert!(Mission::default().with_goal(" ").validate().is_err());
    }
}
