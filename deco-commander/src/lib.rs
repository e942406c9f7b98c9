//! # LLM-DECO Commander
//!
//! The planning side of the orchestrator. A model (or a rule-based stand-in)
//! reads the mission goal and network telemetry, and emits one structured
//! command per cycle for the hub to execute.
//!
//! ## Core Concepts
//! - **Command**: The JSON contract between planner and hub
//! - **Mission**: Goal text plus the battery and uncertainty thresholds
//! - **Tuner**: Picks sampling interval and TX power for a woken node
//! - **Planner**: Rule-based, LLM-backed, or one falling back to the other
//! - **Provider**: Trait-based LLM communication (OpenAI, Anthropic, local)
//! - **Orchestrator**: The closed loop of plan, dispatch and simulated time
//! - **Journal**: JSON-lines history of every cycle

pub mod command;
pub mod schema;
pub mod mission;
pub mod tuner;
pub mod provider;
pub mod planner;
pub mod executor;
pub mod orchestrator;
pub mod journal;
pub mod config;

pub use deco_error::{Error, ErrorKind, ErrorStatus, Result};
pub use command::{parse_command, Action, BoParameters, Command, SensePolicy};
pub use schema::{build_prompt, command_schema, system_prompt};
pub use mission::{Mission, DEFAULT_MISSION_GOAL};
pub use tuner::{ParameterTuner, PresetTuner, TuningPresets};
pub use provider::{
    LlmProvider, ProviderConfig, ProviderType, ProviderError,
    ChatMessage, Role, CompletionRequest, CompletionResponse,
    FinishReason, Usage, UsageTracker,
    OpenAIProvider, AnthropicProvider,
};
pub use planner::{Planner, RulePlanner, LlmPlanner, LlmPlannerConfig, FallbackPlanner};
pub use executor::{DispatchOutcome, Executor};
pub use orchestrator::{CycleReport, LoopConfig, Orchestrator};
pub use journal::DecisionJournal;
pub use config::{DecoConfig, NodeSpec, ProviderKind, ProviderSettings, DEFAULT_CONFIG_PATH};
