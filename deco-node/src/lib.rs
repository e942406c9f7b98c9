//! # LLM-DECO Node
//!
//! The executor side of the orchestrator: a simulated network of
//! battery-powered sensor nodes.
//!
//! ## Core Concepts
//! - **Policy**: What a node is doing right now (sleeping, sensing, transmitting)
//! - **EnergyModel**: Power draw per policy, harvest ceiling, battery capacity
//! - **NodeSimulator**: One node's battery, harvest and uncertainty over time
//! - **Telemetry**: The per-node row handed to the planner
//! - **Network**: The ordered set of nodes the hub controls

pub mod power;
pub mod simulator;
pub mod telemetry;
pub mod network;

pub use deco_error::{Error, ErrorKind, ErrorStatus, Result};
pub use power::{Policy, PowerTable, EnergyModel, DEFAULT_MAX_CAPACITY_JOULES};
pub use simulator::{NodeSimulator, NodeState, SensingSettings};
pub use telemetry::NodeTelemetry;
pub use network::{Network, UncertaintyModel};
