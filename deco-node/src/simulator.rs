//! Single-node energy simulator.
//!
//! Battery level moves by `(harvest - consumption) * dt` and is clamped to
//! `[0, capacity]`. Harvest is the node's ambient potential times the
//! model's harvest ceiling; consumption is the draw of the current policy.

use crate::power::{EnergyModel, Policy};
use crate::telemetry::NodeTelemetry;
use chrono::{DateTime, Utc};
use deco_error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Radio and sampling settings pushed to a node when it is woken.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensingSettings {
    pub sampling_interval_s: f64,
    pub tx_power_dbm: f64,
}

/// Current, real-time status of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    pub node_id: String,
    pub battery_joules: f64,
    pub current_policy: Policy,
    pub last_wake_time: DateTime<Utc>,
    /// Ambient light/heat available for harvesting (0.0 to 1.0)
    pub harvest_potential: f64,
    /// Uncertainty of the node's latest data (0.0 to 1.0)
    pub data_uncertainty: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<SensingSettings>,
}

#[derive(Debug, Clone)]
pub struct NodeSimulator {
    state: NodeState,
    model: EnergyModel,
}

impl NodeSimulator {
    /// Create a node with `initial_joules` of charge (clamped to capacity).
    pub fn new(node_id: impl Into<String>, initial_joules: f64, model: EnergyModel) -> Self {
        let battery_joules = initial_joules.clamp(0.0, model.max_capacity_joules);
        Self {
            state: NodeState {
                node_id: node_id.into(),
                battery_joules,
                current_policy: Policy::Sleep,
                last_wake_time: Utc::now(),
                harvest_potential: 0.0,
                data_uncertainty: 0.5,
                settings: None,
            },
            model,
        }
    }

    /// Create a fully charged node.
    pub fn full(node_id: impl Into<String>, model: EnergyModel) -> Self {
        let capacity = model.max_capacity_joules;
        Self::new(node_id, capacity, model)
    }

    /// Create a node charged to `percent` of its capacity.
    pub fn with_percent(node_id: impl Into<String>, percent: f64, model: EnergyModel) -> Self {
        let joules = model.max_capacity_joules * percent / 100.0;
        Self::new(node_id, joules, model)
    }

    pub fn id(&self) -> &str {
        &self.state.node_id
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    pub fn model(&self) -> &EnergyModel {
        &self.model
    }

    pub fn policy(&self) -> Policy {
        self.state.current_policy
    }

    /// Net energy flow in J/s: harvest minus the current policy's draw.
    pub fn net_power(&self) -> f64 {
        let consume = self.model.power.draw(self.state.current_policy);
        let harvest = self.state.harvest_potential * self.model.harvest_rate_max;
        harvest - consume
    }

    /// Advance the node by `duration_s` seconds.
    pub fn update_state(&mut self, duration_s: f64) -> Result<()> {
        if !duration_s.is_finite() || duration_s < 0.0 {
            return Err(Error::invalid_argument(format!(
                "duration must be a finite, non-negative number of seconds (got {})",
                duration_s
            ))
            .with_operation("node::update_state")
            .with_context("node_id", self.state.node_id.clone()));
        }

        let delta = self.net_power() * duration_s;
        self.state.battery_joules =
            (self.state.battery_joules + delta).clamp(0.0, self.model.max_capacity_joules);
        self.state.last_wake_time = Utc::now();

        tracing::trace!(
            node_id = %self.state.node_id,
            policy = %self.state.current_policy,
            duration_s,
            delta,
            battery_joules = self.state.battery_joules,
            "node state advanced"
        );
        Ok(())
    }

    pub fn set_policy(&mut self, policy: Policy) {
        if self.state.current_policy != policy {
            tracing::debug!(
                node_id = %self.state.node_id,
                from = %self.state.current_policy,
                to = %policy,
                "policy change"
            );
        }
        self.state.current_policy = policy;
    }

    /// Set the policy by wire name. Unknown names leave the node untouched.
    pub fn set_policy_str(&mut self, name: &str) -> Result<()> {
        let policy = name
            .parse::<Policy>()
            .map_err(|e| e.with_context("node_id", self.state.node_id.clone()))?;
        self.set_policy(policy);
        Ok(())
    }

    pub fn set_settings(&mut self, settings: Option<SensingSettings>) {
        self.state.settings = settings;
    }

    pub fn set_harvest_potential(&mut self, potential: f64) {
        self.state.harvest_potential = clamp_unit(potential);
    }

    pub fn set_data_uncertainty(&mut self, uncertainty: f64) {
        self.state.data_uncertainty = clamp_unit(uncertainty);
    }

    pub fn battery_percent(&self) -> f64 {
        self.state.battery_joules / self.model.max_capacity_joules * 100.0
    }

    /// Snapshot of the node in the shape the planner consumes.
    pub fn telemetry(&self) -> NodeTelemetry {
        NodeTelemetry {
            node_id: self.state.node_id.clone(),
            battery_percent: round_to(self.battery_percent(), 2),
            current_policy: self.state.current_policy,
            harvest_potential: self.state.harvest_potential,
            data_uncertainty: round_to(self.state.data_uncertainty, 4),
            max_capacity_joules: self.model.max_capacity_joules,
        }
    }

    /// Telemetry as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.telemetry())?)
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
