//! Telemetry rows - the network state as the planner sees it.

use crate::power::{Policy, DEFAULT_MAX_CAPACITY_JOULES};
use serde::{Deserialize, Serialize};

/// One node's state, as reported to the Commander.
///
/// Deserialization is lenient: missing numeric readings count as zero so a
/// partially reporting node is never mistaken for a healthy one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTelemetry {
    pub node_id: String,
    #[serde(default)]
    pub battery_percent: f64,
    #[serde(default)]
    pub current_policy: Policy,
    #[serde(default)]
    pub harvest_potential: f64,
    #[serde(default)]
    pub data_uncertainty: f64,
    /// Always a JSON float (`3600.0`), also for whole-joule capacities
    #[serde(default = "default_capacity")]
    pub max_capacity_joules: f64,
}

fn default_capacity() -> f64 {
    DEFAULT_MAX_CAPACITY_JOULES
}

impl NodeTelemetry {
    /// Parse a JSON array of telemetry rows.
    pub fn parse_many(json: &str) -> deco_error::Result<Vec<NodeTelemetry>> {
        serde_json::from_str(json).map_err(|e| {
            deco_error::Error::parse_failed(format!("invalid network state: {}", e))
                .with_operation("telemetry::parse_many")
                .set_source(e)
        })
    }

    /// Render rows as the pretty JSON array embedded in prompts.
    pub fn to_json_array(rows: &[NodeTelemetry]) -> deco_error::Result<String> {
        Ok(serde_json::to_string_pretty(rows)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deco_error::ErrorKind;

    #[test]
    fn test_lenient_defaults() {
        let rows = NodeTelemetry::parse_many(r#"[{"node_id": "Node_5"}]"#).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].battery_percent, 0.0);
        assert_eq!(rows[0].data_uncertainty, 0.0);
        assert_eq!(rows[0].current_policy, Policy::Sleep);
        assert_eq!(rows[0].max_capacity_joules, 3600.0);
    }

    #[test]
    fn test_missing_node_id_fails() {
        let err = NodeTelemetry::parse_many(r#"[{"battery_percent": 50}]"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailed);
    }

    #[test]
    fn test_array_rendering_keeps_order() {
        let rows = NodeTelemetry::parse_many(
            r#"[{"node_id": "B", "battery_percent": 10}, {"node_id": "A"}]"#,
        )
        .unwrap();
        let json = NodeTelemetry::to_json_array(&rows).unwrap();
        assert!(json.find("\"B\"").unwrap() < json.find("\"A\"").unwrap());
    }
}
