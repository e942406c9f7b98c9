//! # Orchestrator
//!
//! The closed loop: snapshot, plan, dispatch, let time pass, repeat.
//!
//! One cycle:
//! 1. Snapshot telemetry
//! 2. Ask the planner for a command
//! 3. Dispatch it to the network
//! 4. If a node woke, run its active window, apply the uncertainty
//!    reduction, and send it back to sleep
//! 5. Let the whole network sleep for `sleep_interval_s`

use crate::command::Command;
use crate::executor::{DispatchOutcome, Executor};
use crate::journal::DecisionJournal;
use crate::mission::Mission;
use crate::planner::Planner;
use chrono::{DateTime, Utc};
use deco_error::{Error, Result};
use deco_node::{Network, NodeTelemetry, UncertaintyModel};
use serde::{Deserialize, Serialize};

/// Timing of the closed loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoopConfig {
    pub cycles: usize,
    /// How long a woken node senses before returning to sleep (s)
    pub active_window_s: f64,
    /// Time between planning cycles (s)
    pub sleep_interval_s: f64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            cycles: 24,
            active_window_s: 60.0,
            sleep_interval_s: 3600.0,
        }
    }
}

impl LoopConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("active_window_s", self.active_window_s),
            ("sleep_interval_s", self.sleep_interval_s),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::config_invalid(format!("{} must be non-negative", name))
                    .with_operation("loop_config::validate")
                    .with_context("field", name));
            }
        }
        Ok(())
    }
}

/// Everything that happened in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: usize,
    pub timestamp: DateTime<Utc>,
    pub command: Command,
    pub outcome: DispatchOutcome,
    /// Network state at the end of the cycle
    pub telemetry: Vec<NodeTelemetry>,
}

pub struct Orchestrator<P> {
    planner: P,
    network: Network,
    mission: Mission,
    executor: Executor,
    uncertainty: UncertaintyModel,
    config: LoopConfig,
    journal: Option<DecisionJournal>,
    cycle: usize,
}

impl<P: Planner> Orchestrator<P> {
    pub fn new(planner: P, network: Network, mission: Mission) -> Self {
        let executor = Executor::for_mission(&mission);
        Self {
            planner,
            network,
            mission,
            executor,
            uncertainty: UncertaintyModel::default(),
            config: LoopConfig::default(),
            journal: None,
            cycle: 0,
        }
    }

    pub fn with_loop_config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_uncertainty_model(mut self, model: UncertaintyModel) -> Self {
        self.uncertainty = model;
        self
    }

    pub fn with_journal(mut self, journal: DecisionJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn mission(&self) -> &Mission {
        &self.mission
    }

    pub fn planner(&self) -> &P {
        &self.planner
    }

    /// Run a single planning cycle.
    pub async fn step(&mut self) -> Result<CycleReport> {
        self.cycle += 1;
        let rows = self.network.telemetry();

        let command = self
            .planner
            .plan(&rows, &self.mission)
            .await
            .map_err(|e| e.with_context("cycle", self.cycle.to_string()))?;

        let outcome = self.executor.dispatch(&mut self.network, &command)?;

        if let Some((node_id, policy)) = outcome.woken_node() {
            self.network.advance(self.config.active_window_s)?;
            let node = self.network.get_mut(node_id)?;
            self.uncertainty.retain(node, policy);
            self.executor.release(&mut self.network, node_id)?;
        }

        self.network.advance(self.config.sleep_interval_s)?;
        for node in self.network.nodes_mut() {
            self.uncertainty.drift(node, self.config.sleep_interval_s);
        }

        let report = CycleReport {
            cycle: self.cycle,
            timestamp: Utc::now(),
            command,
            outcome,
            telemetry: self.network.telemetry(),
        };

        tracing::info!(
            cycle = report.cycle,
            planner = self.planner.name(),
            action = %report.command.action,
            target = report.command.target_node_id.as_deref().unwrap_or("-"),
            "cycle complete"
        );

        if let Some(journal) = &self.journal {
            journal
                .append(&report)
                .map_err(|e| e.with_operation("orchestrator::step"))?;
        }

        Ok(report)
    }

    /// Run `cycles` steps from the loop configuration.
    pub async fn run(&mut self) -> Result<Vec<CycleReport>> {
        let mut reports = Vec::with_capacity(self.config.cycles);
        for _ in 0..self.config.cycles {
            reports.push(self.step().await?);
        }
        Ok(reports)
    }
}
