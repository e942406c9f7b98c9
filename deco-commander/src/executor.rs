//! Hub-side dispatch of commands to nodes.

use crate::command::{Action, Command};
use crate::mission::Mission;
use deco_error::{Error, Result};
use deco_node::{Network, Policy, SensingSettings};
use serde::{Deserialize, Serialize};

/// What the hub actually did with a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Woke {
        node_id: String,
        policy: Policy,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        settings: Option<SensingSettings>,
    },
    Idle,
}

impl DispatchOutcome {
    pub fn woken_node(&self) -> Option<(&str, Policy)> {
        match self {
            DispatchOutcome::Woke { node_id, policy, .. } => Some((node_id.as_str(), *policy)),
            DispatchOutcome::Idle => None,
        }
    }
}

/// Applies commands to the network.
///
/// With a battery floor set, the executor refuses wake commands for nodes
/// below it regardless of which planner produced them.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    battery_floor: Option<f64>,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_mission(mission: &Mission) -> Self {
        Self {
            battery_floor: Some(mission.min_battery_percent),
        }
    }

    pub fn dispatch(&self, network: &mut Network, command: &Command) -> Result<DispatchOutcome> {
        command
            .validate_shape()
            .map_err(|e| e.with_operation("executor::dispatch"))?;

        if command.action == Action::DoNothing {
            tracing::info!(reasoning = %command.reasoning, "no action dispatched");
            return Ok(DispatchOutcome::Idle);
        }

        // validate_shape guarantees both for WAKE_NODE
        let (Some(node_id), Some(sense)) = (command.target_node_id.as_deref(), command.new_policy)
        else {
            return Err(Error::invalid_command("wake command without target or policy")
                .with_operation("executor::dispatch"));
        };

        let node = network
            .get_mut(node_id)
            .map_err(|e| e.with_operation("executor::dispatch"))?;

        // Judge the floor on the reported figure, the same one the planner saw.
        if let Some(floor) = self.battery_floor {
            let battery = node.telemetry().battery_percent;
            if battery < floor {
                return Err(Error::constraint_violated(format!(
                    "refusing to wake {}: battery {}% is below the {}% floor",
                    node_id, battery, floor
                ))
                .with_operation("executor::dispatch")
                .with_context("node_id", node_id.to_string()));
            }
        }

        let policy = Policy::from(sense);
        let settings = command.bo_parameters.map(SensingSettings::from);
        node.set_policy(policy);
        node.set_settings(settings);

        tracing::info!(node_id, %policy, ?settings, "node woken");
        Ok(DispatchOutcome::Woke {
            node_id: node_id.to_string(),
            policy,
            settings,
        })
    }

    /// Send a node back to deep sleep after its active window.
    pub fn release(&self, network: &mut Network, node_id: &str) -> Result<()> {
        let node = network
            .get_mut(node_id)
            .map_err(|e| e.with_operation("executor::release"))?;
        node.set_policy(Policy::Sleep);
        tracing::debug!(node_id, "node returned to sleep");
        Ok(())
    }
}
