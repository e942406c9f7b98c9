//! # Configuration
//!
//! One JSON document (conventionally `simulator/config.json`) describes the
//! whole deployment: energy model, mission, tuning presets, which provider
//! plans, loop timing and the initial node roster. Every section is optional
//! and falls back to the demonstration scenario.
//!
//! API keys never live in the file. `provider.api_key_env` names the
//! environment variable to read instead.

use crate::mission::Mission;
use crate::orchestrator::LoopConfig;
use crate::planner::LlmPlannerConfig;
use crate::provider::ProviderConfig;
use crate::tuner::TuningPresets;
use deco_error::{Error, ErrorKind, Result};
use deco_node::{EnergyModel, Network, NodeSimulator, Policy, UncertaintyModel};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "simulator/config.json";

// ============================================================================
// Provider settings
// ============================================================================

/// Which planner backs the Commander.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Rule,
    OpenAI,
    Anthropic,
    /// OpenAI-compatible server (vLLM, Ollama, llama.cpp); key optional
    Local,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Rule => "rule",
            ProviderKind::OpenAI => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Local => "local",
        }
    }

    /// Environment variable holding the API key, if the kind needs one.
    pub fn default_api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Rule | ProviderKind::Local => None,
            ProviderKind::OpenAI => Some("OPENAI_API_KEY"),
            ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rule" => Ok(ProviderKind::Rule),
            "openai" => Ok(ProviderKind::OpenAI),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "local" => Ok(ProviderKind::Local),
            _ => Err(Error::invalid_argument(format!(
                "unknown provider '{}' (expected rule, openai, anthropic or local)",
                s
            ))
            .with_context("provider", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Overrides the kind's default key variable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub retry_backoff_ms: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Rule,
            model: None,
            base_url: None,
            api_key_env: None,
            timeout_secs: 120,
            max_retries: 2,
            temperature: Some(0.2),
            retry_backoff_ms: 500,
        }
    }
}

impl ProviderSettings {
    pub fn api_key_env(&self) -> Option<&str> {
        self.api_key_env
            .as_deref()
            .or_else(|| self.kind.default_api_key_env())
    }

    /// Build the HTTP provider config, reading the key from the process environment.
    pub fn provider_config(&self) -> Result<ProviderConfig> {
        self.provider_config_with(|name| std::env::var(name).ok())
    }

    /// Same as [`provider_config`](Self::provider_config) with an explicit key lookup.
    pub fn provider_config_with<F>(&self, lookup: F) -> Result<ProviderConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        match self.kind {
            ProviderKind::Rule => {
                return Err(Error::new(
                    ErrorKind::Unsupported,
                    "the rule planner does not use an LLM provider",
                )
                .with_operation("provider_settings::provider_config"))
            }
            ProviderKind::Local => return self.local_config(lookup),
            ProviderKind::OpenAI | ProviderKind::Anthropic => {}
        }

        let Some(env) = self.api_key_env() else {
            return Err(Error::unexpected("hosted provider without an API key variable")
                .with_operation("provider_settings::provider_config"));
        };

        let key = lookup(env).filter(|k| !k.trim().is_empty()).ok_or_else(|| {
            Error::new(
                ErrorKind::ProviderUnavailable,
                format!("environment variable {} is not set", env),
            )
            .permanent()
            .with_operation("provider_settings::provider_config")
            .with_context("env", env.to_string())
        })?;

        let mut config = match self.kind {
            ProviderKind::Anthropic => ProviderConfig::anthropic(key),
            _ => ProviderConfig::openai(key),
        };
        if let Some(model) = &self.model {
            config = config.with_model(model.clone());
        }
        if let Some(url) = &self.base_url {
            config = config.with_base_url(url.clone());
        }
        Ok(config.with_timeout(self.timeout_secs))
    }

    /// Local servers need a base URL and a model name. A key is sent only
    /// when `api_key_env` is set and the variable is non-empty.
    fn local_config<F>(&self, lookup: F) -> Result<ProviderConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (Some(url), Some(model)) = (self.base_url.as_deref(), self.model.as_deref()) else {
            return Err(Error::config_invalid("the local provider needs base_url and model")
                .with_operation("provider_settings::provider_config")
                .with_context("kind", self.kind.as_str()));
        };

        let mut config = ProviderConfig::local(url, model);
        config.api_key = self
            .api_key_env
            .as_deref()
            .and_then(|env| lookup(env))
            .filter(|k| !k.trim().is_empty());
        Ok(config.with_timeout(self.timeout_secs))
    }

    pub fn planner_config(&self) -> LlmPlannerConfig {
        LlmPlannerConfig {
            model: self.model.clone(),
            temperature: self.temperature,
            max_retries: self.max_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            ..LlmPlannerConfig::default()
        }
    }
}

// ============================================================================
// Node roster
// ============================================================================

/// Initial state of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeSpec {
    pub node_id: String,
    pub battery_percent: f64,
    pub harvest_potential: f64,
    pub data_uncertainty: f64,
    pub policy: Policy,
}

impl Default for NodeSpec {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            battery_percent: 100.0,
            harvest_potential: 0.0,
            data_uncertainty: 0.5,
            policy: Policy::Sleep,
        }
    }
}

impl NodeSpec {
    pub fn new(node_id: impl Into<String>, battery_percent: f64) -> Self {
        Self {
            node_id: node_id.into(),
            battery_percent,
            ..Self::default()
        }
    }

    pub fn build(&self, model: &EnergyModel) -> NodeSimulator {
        let mut node = NodeSimulator::with_percent(&self.node_id, self.battery_percent, model.clone());
        node.set_harvest_potential(self.harvest_potential);
        node.set_data_uncertainty(self.data_uncertainty);
        node.set_policy(self.policy);
        node
    }
}

fn demo_nodes() -> Vec<NodeSpec> {
    vec![
        NodeSpec {
            node_id: "Node_42".into(),
            battery_percent: 83.33,
            harvest_potential: 0.0,
            data_uncertainty: 0.5,
            policy: Policy::Sleep,
        },
        NodeSpec {
            node_id: "Node_11".into(),
            battery_percent: 27.78,
            harvest_potential: 0.9,
            data_uncertainty: 0.8,
            policy: Policy::Sleep,
        },
    ]
}

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecoConfig {
    pub energy: EnergyModel,
    pub uncertainty: UncertaintyModel,
    pub mission: Mission,
    pub tuning: TuningPresets,
    pub provider: ProviderSettings,
    #[serde(rename = "loop")]
    pub loop_config: LoopConfig,
    pub nodes: Vec<NodeSpec>,
}

impl Default for DecoConfig {
    fn default() -> Self {
        Self {
            energy: EnergyModel::default(),
            uncertainty: UncertaintyModel::default(),
            mission: Mission::default(),
            tuning: TuningPresets::default(),
            provider: ProviderSettings::default(),
            loop_config: LoopConfig::default(),
            nodes: demo_nodes(),
        }
    }
}

impl DecoConfig {
    /// Read and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::from(e)
                .with_operation("config::load")
                .with_context("path", path.display().to_string())
        })?;
        let config = Self::from_json(&text)
            .map_err(|e| e.with_context("path", path.display().to_string()))?;
        tracing::debug!(path = %path.display(), nodes = config.nodes.len(), "config loaded");
        Ok(config)
    }

    /// Load `path` if given, else the default location if it exists, else defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH),
            None => Ok(Self::default()),
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).map_err(|e| {
            Error::config_invalid(format!("invalid config: {}", e))
                .with_operation("config::parse")
                .set_source(e)
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.energy.validate()?;
        self.uncertainty.validate()?;
        self.mission.validate()?;
        self.tuning.validate()?;
        self.loop_config.validate()?;

        if self.provider.kind == ProviderKind::Local
            && (self.provider.base_url.is_none() || self.provider.model.is_none())
        {
            return Err(Error::config_invalid("provider kind local needs base_url and model")
                .with_operation("config::validate"));
        }

        if self.provider.timeout_secs == 0 {
            return Err(Error::config_invalid("provider.timeout_secs must be positive")
                .with_operation("config::validate"));
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if node.node_id.trim().is_empty() {
                return Err(Error::config_invalid("node_id must not be empty")
                    .with_operation("config::validate"));
            }
            if !seen.insert(node.node_id.as_str()) {
                return Err(Error::config_invalid(format!("duplicate node_id {}", node.node_id))
                    .with_operation("config::validate")
                    .with_context("node_id", node.node_id.clone()));
            }
            if !(0.0..=100.0).contains(&node.battery_percent) {
                return Err(Error::config_invalid(format!(
                    "battery_percent of {} must be within [0, 100]",
                    node.node_id
                ))
                .with_operation("config::validate")
                .with_context("node_id", node.node_id.clone()));
            }
            for (name, value) in [
                ("harvest_potential", node.harvest_potential),
                ("data_uncertainty", node.data_uncertainty),
            ] {
                if !(0.0..=1.0).contains(&value) {
                    return Err(Error::config_invalid(format!(
                        "{} of {} must be within [0, 1]",
                        name, node.node_id
                    ))
                    .with_operation("config::validate")
                    .with_context("node_id", node.node_id.clone())
                    .with_context("field", name));
                }
            }
        }
        Ok(())
    }

    pub fn build_network(&self) -> Result<Network> {
        let mut network = Network::new();
        for node in &self.nodes {
            network.add(node.build(&self.energy))?;
        }
        Ok(network)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
