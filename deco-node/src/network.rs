//! The network of nodes controlled by the hub.

use crate::power::Policy;
use crate::simulator::NodeSimulator;
use crate::telemetry::NodeTelemetry;
use deco_error::{Error, Result};
use serde::{Deserialize, Serialize};

/// How data uncertainty evolves between planning cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UncertaintyModel {
    /// Linear growth per hour while a node is not sensing
    pub drift_per_hour: f64,
    /// Fraction of uncertainty left after a SENSE_LOW window
    pub sense_low_retention: f64,
    /// Fraction of uncertainty left after a SENSE_HIGH window
    pub sense_high_retention: f64,
}

impl Default for UncertaintyModel {
    fn default() -> Self {
        Self {
            drift_per_hour: 0.05,
            sense_low_retention: 0.6,
            sense_high_retention: 0.25,
        }
    }
}

impl UncertaintyModel {
    pub fn validate(&self) -> Result<()> {
        if !self.drift_per_hour.is_finite() || self.drift_per_hour < 0.0 {
            return Err(Error::config_invalid("drift_per_hour must be non-negative")
                .with_operation("uncertainty_model::validate"));
        }
        for (name, value) in [
            ("sense_low_retention", self.sense_low_retention),
            ("sense_high_retention", self.sense_high_retention),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::config_invalid(format!("{} must be within [0, 1]", name))
                    .with_operation("uncertainty_model::validate")
                    .with_context("field", name));
            }
        }
        Ok(())
    }

    /// Grow uncertainty of a non-sensing node over `duration_s`.
    pub fn drift(&self, node: &mut NodeSimulator, duration_s: f64) {
        if node.policy().is_sensing() {
            return;
        }
        let grown = node.state().data_uncertainty + self.drift_per_hour * duration_s / 3600.0;
        node.set_data_uncertainty(grown);
    }

    /// Shrink uncertainty after a sensing window under `policy`.
    pub fn retain(&self, node: &mut NodeSimulator, policy: Policy) {
        let factor = match policy {
            Policy::SenseLow => self.sense_low_retention,
            Policy::SenseHigh => self.sense_high_retention,
            _ => return,
        };
        let reduced = node.state().data_uncertainty * factor;
        node.set_data_uncertainty(reduced);
    }
}

/// Ordered collection of nodes, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct Network {
    nodes: Vec<NodeSimulator>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Ids must be unique.
    pub fn add(&mut self, node: NodeSimulator) -> Result<()> {
        if self.contains(node.id()) {
            return Err(Error::invalid_argument(format!("duplicate node id '{}'", node.id()))
                .with_operation("network::add")
                .with_context("node_id", node.id().to_string()));
        }
        self.nodes.push(node);
        Ok(())
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.iter().any(|n| n.id() == node_id)
    }

    pub fn get(&self, node_id: &str) -> Result<&NodeSimulator> {
        self.nodes
            .iter()
            .find(|n| n.id() == node_id)
            .ok_or_else(|| Error::node_not_found(node_id).with_operation("network::get"))
    }

    pub fn get_mut(&mut self, node_id: &str) -> Result<&mut NodeSimulator> {
        self.nodes
            .iter_mut()
            .find(|n| n.id() == node_id)
            .ok_or_else(|| Error::node_not_found(node_id).with_operation("network::get_mut"))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeSimulator> {
        self.nodes.iter()
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut NodeSimulator> {
        self.nodes.iter_mut()
    }

    /// Telemetry rows in insertion order.
    pub fn telemetry(&self) -> Vec<NodeTelemetry> {
        self.nodes.iter().map(NodeSimulator::telemetry).collect()
    }

    /// Telemetry rows as a pretty JSON array.
    pub fn state_json(&self) -> Result<String> {
        NodeTelemetry::to_json_array(&self.telemetry())
    }

    /// Advance every node by `duration_s` seconds.
    pub fn advance(&mut self, duration_s: f64) -> Result<()> {
        for node in &mut self.nodes {
            node.update_state(duration_s)?;
        }
        tracing::debug!(nodes = self.nodes.len(), duration_s, "network advanced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::power::EnergyModel;
    use deco_error::ErrorKind;

    fn network() -> Network {
        let mut net = Network::new();
        net.add(NodeSimulator::with_percent("Node_42", 83.33, EnergyModel::default()))
            .unwrap();
        net.add(NodeSimulator::with_percent("Node_11", 27.78, EnergyModel::default()))
            .unwrap();
        net
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut net = network();
        let err = net
            .add(NodeSimulator::full("Node_42", EnergyModel::default()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(net.len(), 2);
    }

    #[test]
    fn test_lookup() {
        let mut net = network();
        assert_eq!(net.get("Node_11").unwrap().id(), "Node_11");
        assert_eq!(net.get("Node_7").unwrap_err().kind(), ErrorKind::NodeNotFound);
        net.get_mut("Node_11").unwrap().set_policy(Policy::SenseLow);
        assert_eq!(net.get("Node_11").unwrap().policy(), Policy::SenseLow);
    }

    #[test]
    fn test_telemetry_order_and_json() {
        let net = network();
        let rows = net.telemetry();
        assert_eq!(rows[0].node_id, "Node_42");
        assert_eq!(rows[0].battery_percent, 83.33);
        assert_eq!(rows[1].battery_percent, 27.78);

        let parsed: serde_json::Value = serde_json::from_str(&net.state_json().unwrap()).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_advance_updates_every_node() {
        let mut net = network();
        for node in net.nodes_mut() {
            node.set_policy(Policy::SenseHigh);
        }
        net.advance(10.0).unwrap();
        for node in net.nodes() {
            assert!(node.battery_percent() < 83.34);
        }
        assert!(net.get("Node_11").unwrap().battery_percent() < 27.78);
    }

    #[test]
    fn test_uncertainty_drift_skips_sensing_nodes() {
        let model = UncertaintyModel::default();
        let mut sleeping = NodeSimulator::full("A", EnergyModel::default());
        let mut sensing = NodeSimulator::full("B", EnergyModel::default());
        sensing.set_policy(Policy::SenseLow);

        model.drift(&mut sleeping, 3600.0);
        model.drift(&mut sensing, 3600.0);
        assert!((sleeping.state().data_uncertainty - 0.55).abs() < 1e-9);
        assert_eq!(sensing.state().data_uncertainty, 0.5);

        model.drift(&mut sleeping, 3600.0 * 100.0);
        assert_eq!(sleeping.state().data_uncertainty, 1.0);
    }

    #[test]
    fn test_uncertainty_retention() {
        let model = UncertaintyModel::default();
        let mut node = NodeSimulator::full("A", EnergyModel::default());
        node.set_data_uncertainty(0.8);
        model.retain(&mut node, Policy::SenseHigh);
        assert!((node.state().data_uncertainty - 0.2).abs() < 1e-9);
        model.retain(&mut node, Policy::Sleep);
        assert!((node.state().data_uncertainty - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_uncertainty_model_validation() {
        let mut model = UncertaintyModel::default();
        assert!(model.validate().is_ok());
        model.sense_high_retention = 1.5;
        assert_eq!(model.validate().unwrap_err().kind(), ErrorKind::ConfigInvalid);
    }
}
