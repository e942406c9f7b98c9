//! # Commands
//!
//! The structured JSON command the Commander hands to the hub. Whether it
//! came from a model or from the rule planner, a command is validated in two
//! steps before it touches a node:
//!
//! 1. `validate_shape` - the command is internally consistent
//! 2. `validate_against` - the target exists and the mission allows waking it

use crate::mission::Mission;
use deco_error::{Error, ErrorKind, Result};
use deco_node::{NodeTelemetry, Policy, SensingSettings};
use serde::{Deserialize, Serialize};
use std::fmt;

/// High-level action requested by the Commander.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    WakeNode,
    DoNothing,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::WakeNode => "WAKE_NODE",
            Action::DoNothing => "DO_NOTHING",
        })
    }
}

/// Sensing policy a woken node should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SensePolicy {
    SenseLow,
    SenseHigh,
}

impl From<SensePolicy> for Policy {
    fn from(policy: SensePolicy) -> Self {
        match policy {
            SensePolicy::SenseLow => Policy::SenseLow,
            SensePolicy::SenseHigh => Policy::SenseHigh,
        }
    }
}

impl fmt::Display for SensePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Policy::from(*self).fmt(f)
    }
}

/// Numeric settings produced by the parameter optimiser.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoParameters {
    /// Sampling interval in seconds
    pub sampling_interval_s: f64,
    /// Transmission power in dBm
    pub tx_power_dbm: f64,
}

impl BoParameters {
    pub fn new(sampling_interval_s: f64, tx_power_dbm: f64) -> Self {
        Self {
            sampling_interval_s,
            tx_power_dbm,
        }
    }
}

impl From<BoParameters> for SensingSettings {
    fn from(params: BoParameters) -> Self {
        SensingSettings {
            sampling_interval_s: params.sampling_interval_s,
            tx_power_dbm: params.tx_power_dbm,
        }
    }
}

/// A single orchestration decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_policy: Option<SensePolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bo_parameters: Option<BoParameters>,
    pub reasoning: String,
}

impl Command {
    pub fn wake(
        node_id: impl Into<String>,
        policy: SensePolicy,
        params: BoParameters,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            action: Action::WakeNode,
            target_node_id: Some(node_id.into()),
            new_policy: Some(policy),
            bo_parameters: Some(params),
            reasoning: reasoning.into(),
        }
    }

    pub fn do_nothing(reasoning: impl Into<String>) -> Self {
        Self {
            action: Action::DoNothing,
            target_node_id: None,
            new_policy: None,
            bo_parameters: None,
            reasoning: reasoning.into(),
        }
    }

    pub fn is_wake(&self) -> bool {
        self.action == Action::WakeNode
    }

    /// Check the command is internally consistent.
    pub fn validate_shape(&self) -> Result<()> {
        let fail = |msg: &str| {
            Err(Error::invalid_command(msg.to_string())
                .with_operation("command::validate_shape")
                .with_context("action", self.action.to_string()))
        };

        if self.reasoning.trim().is_empty() {
            return fail("reasoning must not be empty");
        }

        match self.action {
            Action::WakeNode => {
                match self.target_node_id.as_deref() {
                    None => return fail("WAKE_NODE requires target_node_id"),
                    Some(id) if id.trim().is_empty() => {
                        return fail("target_node_id must not be empty")
                    }
                    Some(_) => {}
                }
                if self.new_policy.is_none() {
                    return fail("WAKE_NODE requires new_policy");
                }
            }
            Action::DoNothing => {
                if self.target_node_id.is_some() {
                    return fail("DO_NOTHING must not name a target node");
                }
                if self.new_policy.is_some() {
                    return fail("DO_NOTHING must not carry a sensing policy");
                }
            }
        }

        if let Some(params) = &self.bo_parameters {
            if !params.sampling_interval_s.is_finite() || !params.tx_power_dbm.is_finite() {
                return fail("bo_parameters must be finite numbers");
            }
            if params.sampling_interval_s <= 0.0 {
                return fail("sampling_interval_s must be positive");
            }
        }

        Ok(())
    }

    /// Check the command against the current network and mission constraints.
    pub fn validate_against(&self, rows: &[NodeTelemetry], mission: &Mission) -> Result<()> {
        let Some(target) = self.target_node_id.as_deref().filter(|_| self.is_wake()) else {
            return Ok(());
        };

        let row = rows
            .iter()
            .find(|r| r.node_id == target)
            .ok_or_else(|| Error::node_not_found(target).with_operation("command::validate_against"))?;

        if row.battery_percent < mission.min_battery_percent {
            return Err(Error::constraint_violated(format!(
                "{} has {}% battery, below the {}% minimum",
                target, row.battery_percent, mission.min_battery_percent
            ))
            .with_operation("command::validate_against")
            .with_context("node_id", target.to_string()));
        }
        Ok(())
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Pull the JSON object out of a model reply (handles markdown fences and
/// leading prose).
pub fn extract_json(content: &str) -> &str {
    let fenced = if content.contains("```json") {
        content
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
    } else if content.contains("```") {
        content.split("```").nth(1)
    } else {
        None
    };

    let candidate = fenced.map(str::trim).unwrap_or_else(|| content.trim());
    if candidate.starts_with('{') {
        return candidate;
    }

    match (candidate.find('{'), candidate.rfind('}')) {
        (Some(start), Some(end)) if start < end => &candidate[start..=end],
        _ => candidate,
    }
}

/// Parse and shape-check a command from raw model output.
pub fn parse_command(content: &str) -> Result<Command> {
    let json_str = extract_json(content);

    let command: Command = serde_json::from_str(json_str).map_err(|e| {
        Error::new(ErrorKind::ParseFailed, format!("failed to parse command: {}", e))
            .with_operation("command::parse")
            .with_context("content", truncate(json_str, 200))
            .set_source(e)
    })?;

    command.validate_shape()?;
    Ok(command)
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{}…", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<NodeTelemetry> {
        NodeTelemetry::parse_many(
            r#"[
                {"node_id": "Node_42", "battery_percent": 83.33, "data_uncertainty": 0.5},
                {"node_id": "Node_3", "battery_percent": 12.0, "data_uncertainty": 0.95}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_wire_format() {
        let cmd = Command::wake(
            "Node_11",
            SensePolicy::SenseHigh,
            BoParameters::new(5.0, 10.0),
            "high uncertainty",
        );
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(value["action"], "WAKE_NODE");
        assert_eq!(value["new_policy"], "SENSE_HIGH");
        assert_eq!(value["bo_parameters"]["sampling_interval_s"], 5.0);

        let idle = serde_json::to_value(Command::do_nothing("all good")).unwrap();
        assert_eq!(idle["action"], "DO_NOTHING");
        assert!(idle.get("target_node_id").is_none());
        assert!(idle.get("bo_parameters").is_none());
    }

    #[test]
    fn test_parse_fenced_reply() {
        let reply = "Here is my decision:\n```json\n{\"action\": \"DO_NOTHING\", \"reasoning\": \"stable\"}\n```";
        let cmd = parse_command(reply).unwrap();
        assert_eq!(cmd.action, Action::DoNothing);
    }

    #[test]
    fn test_parse_reply_with_prose() {
        let reply = "Decision: {\"action\": \"WAKE_NODE\", \"target_node_id\": \"Node_42\", \"new_policy\": \"SENSE_LOW\", \"reasoning\": \"r\"} done";
        let cmd = parse_command(reply).unwrap();
        assert_eq!(cmd.target_node_id.as_deref(), Some("Node_42"));
        assert_eq!(cmd.new_policy, Some(SensePolicy::SenseLow));
    }

    #[test]
    fn test_parse_rejects_unknown_action() {
        let err = parse_command(r#"{"action": "REBOOT", "reasoning": "x"}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailed);
    }

    #[test]
    fn test_parse_requires_reasoning() {
        let err = parse_command(r#"{"action": "DO_NOTHING"}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailed);
    }

    #[test]
    fn test_shape_rules() {
        let err = parse_command(r#"{"action": "WAKE_NODE", "new_policy": "SENSE_LOW", "reasoning": "x"}"#)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCommand);

        let err = parse_command(r#"{"action": "WAKE_NODE", "target_node_id": "Node_42", "reasoning": "x"}"#)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCommand);

        let mut cmd = Command::wake("Node_42", SensePolicy::SenseLow, BoParameters::new(0.0, 5.0), "x");
        assert_eq!(cmd.validate_shape().unwrap_err().kind(), ErrorKind::InvalidCommand);
        cmd.bo_parameters = None;
        assert!(cmd.validate_shape().is_ok());

        let cmd = Command::do_nothing("   ");
        assert_eq!(cmd.validate_shape().unwrap_err().kind(), ErrorKind::InvalidCommand);
    }

    #[test]
    fn test_do_nothing_must_stay_bare() {
        let err = parse_command(r#"{"action": "DO_NOTHING", "target_node_id": "Node_42", "reasoning": "x"}"#)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCommand);
        assert_eq!(err.context_value("action"), Some("DO_NOTHING"));

        let err = parse_command(r#"{"action": "DO_NOTHING", "new_policy": "SENSE_HIGH", "reasoning": "x"}"#)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCommand);

        let cmd = parse_command(
            r#"{"action": "DO_NOTHING", "bo_parameters": {"sampling_interval_s": 30, "tx_power_dbm": 5}, "reasoning": "x"}"#,
        )
        .unwrap();
        assert_eq!(cmd.action, Action::DoNothing);
    }

    #[test]
    fn test_validate_against_network() {
        let mission = Mission::default();

        let cmd = Command::wake("Node_42", SensePolicy::SenseLow, BoParameters::new(30.0, 5.0), "ok");
        assert!(cmd.validate_against(&rows(), &mission).is_ok());

        let cmd = Command::wake("Node_99", SensePolicy::SenseLow, BoParameters::new(30.0, 5.0), "ghost");
        assert_eq!(
            cmd.validate_against(&rows(), &mission).unwrap_err().kind(),
            ErrorKind::NodeNotFound
        );

        let cmd = Command::wake("Node_3", SensePolicy::SenseHigh, BoParameters::new(5.0, 10.0), "drain");
        let err = cmd.validate_against(&rows(), &mission).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstraintViolated);
        assert_eq!(err.context_value("node_id"), Some("Node_3"));

        assert!(Command::do_nothing("idle").validate_against(&rows(), &mission).is_ok());
    }

    #[test]
    fn test_extract_json_plain() {
        assert_eq!(extract_json("  {\"a\": 1}  "), "{\"a\": 1}");
        assert_eq!(extract_json("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(extract_json("no json here"), "no json here");
    }
}
