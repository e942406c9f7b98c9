//! # Planners
//!
//! A planner turns a telemetry snapshot and a mission into one [`Command`].
//!
//! - [`RulePlanner`]: deterministic heuristic, no model involved
//! - [`LlmPlanner`]: asks an [`LlmProvider`] and validates what comes back
//! - [`FallbackPlanner`]: tries one planner, falls back to another on error

use crate::command::{parse_command, Command, SensePolicy};
use crate::mission::Mission;
use crate::provider::{ChatMessage, CompletionRequest, LlmProvider, UsageTracker};
use crate::schema::{build_prompt, system_prompt};
use crate::tuner::{ParameterTuner, PresetTuner};
use deco_error::{Error, ErrorKind, Result};
use deco_node::NodeTelemetry;
use std::sync::Mutex;
use std::time::Duration;

/// Produces one command per planning cycle.
#[allow(async_fn_in_trait)]
pub trait Planner: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn plan(&self, rows: &[NodeTelemetry], mission: &Mission) -> Result<Command>;
}

// ============================================================================
// Rule planner
// ============================================================================

/// Wakes the most uncertain node that is allowed to spend energy.
#[derive(Debug, Clone, Default)]
pub struct RulePlanner<T = PresetTuner> {
    tuner: T,
}

impl RulePlanner<PresetTuner> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: ParameterTuner> RulePlanner<T> {
    pub fn with_tuner(tuner: T) -> Self {
        Self { tuner }
    }

    /// The decision itself, without the async wrapper.
    pub fn decide(&self, rows: &[NodeTelemetry], mission: &Mission) -> Command {
        let floor = mission.min_battery_percent;

        // First node wins ties: the comparison is strict.
        let mut best: Option<&NodeTelemetry> = None;
        let mut max_uncertainty = -1.0;
        for row in rows {
            if row.battery_percent >= floor && row.data_uncertainty > max_uncertainty {
                max_uncertainty = row.data_uncertainty;
                best = Some(row);
            }
        }

        let Some(node) = best.filter(|_| max_uncertainty > mission.uncertainty_threshold) else {
            tracing::debug!(candidates = rows.len(), floor, "no node requires action");
            return Command::do_nothing(format!(
                "No node requires critical action. All high-uncertainty nodes are either below \
                 the {}% critical battery threshold or all uncertainty is currently acceptable.",
                floor
            ));
        };

        let (policy, reasoning) = if node.harvest_potential > mission.high_harvest_threshold {
            let policy = SensePolicy::SenseHigh;
            let reasoning = format!(
                "{} has the highest uncertainty ({}) and meets the {}% battery minimum. \
                 It also has high harvest potential ({}), justifying the energy-intensive {} \
                 policy to rapidly meet the mission goal.",
                node.node_id, max_uncertainty, floor, node.harvest_potential, policy
            );
            (policy, reasoning)
        } else {
            let policy = SensePolicy::SenseLow;
            let reasoning = format!(
                "{} has the highest uncertainty ({}) and meets the {}% battery minimum. \
                 We are using the energy-efficient {} policy due to low ambient harvest potential.",
                node.node_id, max_uncertainty, floor, policy
            );
            (policy, reasoning)
        };

        let params = self.tuner.suggest(node, policy);
        tracing::debug!(node_id = %node.node_id, %policy, uncertainty = max_uncertainty, "rule planner wake");
        Command::wake(node.node_id.clone(), policy, params, reasoning)
    }
}

impl<T: ParameterTuner> Planner for RulePlanner<T> {
    fn name(&self) -> &str {
        "rule"
    }

    async fn plan(&self, rows: &[NodeTelemetry], mission: &Mission) -> Result<Command> {
        Ok(self.decide(rows, mission))
    }
}

// ============================================================================
// LLM planner
// ============================================================================

/// Settings for [`LlmPlanner`].
#[derive(Debug, Clone)]
pub struct LlmPlannerConfig {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: usize,
    /// Extra attempts after the first one
    pub max_retries: usize,
    /// Base delay before retrying a temporary provider failure
    pub retry_backoff: Duration,
}

impl Default for LlmPlannerConfig {
    fn default() -> Self {
        Self {
            model: None,
            temperature: Some(0.2),
            max_tokens: 1024,
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Asks a model for the command and holds it to the mission constraints.
pub struct LlmPlanner<P> {
    provider: P,
    config: LlmPlannerConfig,
    usage: Mutex<UsageTracker>,
}

impl<P: LlmProvider> LlmPlanner<P> {
    pub fn new(provider: P) -> Self {
        Self::with_config(provider, LlmPlannerConfig::default())
    }

    pub fn with_config(provider: P, config: LlmPlannerConfig) -> Self {
        Self {
            provider,
            config,
            usage: Mutex::new(UsageTracker::new()),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Token usage accumulated so far
    pub fn usage(&self) -> UsageTracker {
        self.usage
            .lock()
            .map(|u| u.clone())
            .unwrap_or_default()
    }

    fn request(&self, messages: Vec<ChatMessage>) -> CompletionRequest {
        let mut request = CompletionRequest::new(messages)
            .with_max_tokens(self.config.max_tokens)
            .with_json_mode(true);
        if let Some(model) = &self.config.model {
            request = request.with_model(model.clone());
        }
        if let Some(temp) = self.config.temperature {
            request = request.with_temperature(temp);
        }
        request
    }

    /// One round trip. On failure also returns the raw reply, if there was one.
    async fn attempt(
        &self,
        messages: &[ChatMessage],
        rows: &[NodeTelemetry],
        mission: &Mission,
    ) -> std::result::Result<Command, (Error, Option<String>)> {
        let response = self
            .provider
            .complete(self.request(messages.to_vec()))
            .await
            .map_err(|e| (Error::from(e), None))?;

        if let Ok(mut usage) = self.usage.lock() {
            usage.track(&response.model, &response.usage);
        }

        let content = response.content.ok_or_else(|| {
            (
                Error::inference_failed("model returned no content").with_operation("llm_planner::plan"),
                None,
            )
        })?;

        let command = parse_command(&content).map_err(|e| (e, Some(content.clone())))?;
        command
            .validate_against(rows, mission)
            .map_err(|e| (e, Some(content.clone())))?;
        Ok(command)
    }
}

/// Errors the model can fix if told what went wrong.
fn is_correctable(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ParseFailed
            | ErrorKind::InvalidCommand
            | ErrorKind::NodeNotFound
            | ErrorKind::ConstraintViolated
    )
}

impl<P: LlmProvider> Planner for LlmPlanner<P> {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn plan(&self, rows: &[NodeTelemetry], mission: &Mission) -> Result<Command> {
        let state_json = NodeTelemetry::to_json_array(rows)?;
        let mut messages = vec![
            ChatMessage::system(system_prompt()),
            ChatMessage::user(build_prompt(&state_json, &mission.goal)),
        ];

        let mut attempt = 0usize;
        loop {
            attempt += 1;
            let (err, reply) = match self.attempt(&messages, rows, mission).await {
                Ok(command) => {
                    tracing::info!(
                        provider = self.provider.name(),
                        action = %command.action,
                        attempt,
                        "model produced a valid command"
                    );
                    return Ok(command);
                }
                Err(failure) => failure,
            };

            let retryable = err.is_retryable() || is_correctable(err.kind());
            if !retryable || attempt > self.config.max_retries {
                return Err(err
                    .persist()
                    .with_operation("llm_planner::plan")
                    .with_context("attempts", attempt.to_string()));
            }

            tracing::warn!(
                provider = self.provider.name(),
                attempt,
                error = %err,
                "planning attempt failed, retrying"
            );

            match reply {
                Some(reply) => {
                    messages.push(ChatMessage::assistant(reply));
                    messages.push(ChatMessage::user(format!(
                        "Your previous reply was rejected: {}. Reply again with a single JSON \
                         object that satisfies the schema and the mission constraints.",
                        err.message()
                    )));
                }
                None => {
                    let delay = self.config.retry_backoff * attempt as u32;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

// ============================================================================
// Fallback planner
// ============================================================================

/// Uses `primary`, and `fallback` whenever `primary` fails.
pub struct FallbackPlanner<A, B> {
    primary: A,
    fallback: B,
}

impl<A: Planner, B: Planner> FallbackPlanner<A, B> {
    pub fn new(primary: A, fallback: B) -> Self {
        Self { primary, fallback }
    }

    pub fn primary(&self) -> &A {
        &self.primary
    }
}

impl<A: Planner, B: Planner> Planner for FallbackPlanner<A, B> {
    fn name(&self) -> &str {
        self.primary.name()
    }

    async fn plan(&self, rows: &[NodeTelemetry], mission: &Mission) -> Result<Command> {
        match self.primary.plan(rows, mission).await {
            Ok(command) => Ok(command),
            Err(err) => {
                tracing::warn!(
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    error = %err,
                    "primary planner failed, using fallback"
                );
                self.fallback.plan(rows, mission).await
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::command::{Action, BoParameters};
    use crate::provider::{CompletionResponse, FinishReason, ProviderError, Usage};
    use std::collections::VecDeque;

    /// Replays canned replies in order and records every request.
    pub(crate) struct ScriptedProvider {
        replies: Mutex<VecDeque<std::result::Result<String, ProviderError>>>,
        pub(crate) requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedProvider {
        pub(crate) fn new(replies: Vec<std::result::Result<String, ProviderError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn models(&self) -> Vec<String> {
            vec!["scripted-1".into()]
        }

        fn default_model(&self) -> &str {
            "scripted-1"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> std::result::Result<CompletionResponse, ProviderError> {
            self.requests.lock().unwrap().push(request);
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::Other("script exhausted".into())))?;
            Ok(CompletionResponse {
                id: "resp".into(),
                model: "scripted-1".into(),
                content: Some(reply),
                finish_reason: FinishReason::Stop,
                usage: Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                },
            })
        }
    }

    pub(crate) fn demo_rows() -> Vec<NodeTelemetry> {
        NodeTelemetry::parse_many(
            r#"[
                {"node_id": "Node_42", "battery_percent": 83.33, "current_policy": "SLEEP",
                 "harvest_potential": 0.0, "data_uncertainty": 0.5, "max_capacity_joules": 3600},
                {"node_id": "Node_11", "battery_percent": 27.78, "current_policy": "SLEEP",
                 "harvest_potential": 0.9, "data_uncertainty": 0.8, "max_capacity_joules": 3600}
            ]"#,
        )
        .unwrap()
    }

    fn fast_config() -> LlmPlannerConfig {
        LlmPlannerConfig {
            retry_backoff: Duration::ZERO,
            ..LlmPlannerConfig::default()
        }
    }

    #[test]
    fn test_rule_planner_demo_scenario() {
        let cmd = RulePlanner::new().decide(&demo_rows(), &Mission::default());
        assert_eq!(cmd.action, Action::WakeNode);
        assert_eq!(cmd.target_node_id.as_deref(), Some("Node_11"));
        assert_eq!(cmd.new_policy, Some(SensePolicy::SenseHigh));
        assert_eq!(cmd.bo_parameters, Some(BoParameters::new(5.0, 10.0)));
        assert!(cmd.reasoning.starts_with("Node_11 has the highest uncertainty (0.8)"));
        assert!(cmd.reasoning.contains("high harvest potential (0.9)"));
    }

    #[test]
    fn test_rule_planner_low_harvest_uses_sense_low() {
        let mut rows = demo_rows();
        rows[1].harvest_potential = 0.7;
        let cmd = RulePlanner::new().decide(&rows, &Mission::default());
        assert_eq!(cmd.new_policy, Some(SensePolicy::SenseLow));
        assert_eq!(cmd.bo_parameters, Some(BoParameters::new(30.0, 5.0)));
        assert!(cmd.reasoning.contains("energy-efficient SENSE_LOW"));
    }

    #[test]
    fn test_rule_planner_respects_battery_floor() {
        let mut rows = demo_rows();
        rows[1].battery_percent = 19.99;
        let cmd = RulePlanner::new().decide(&rows, &Mission::default());
        // Node_42 is eligible but its 0.5 uncertainty is acceptable
        assert_eq!(cmd.action, Action::DoNothing);
        assert!(cmd.reasoning.contains("below the 20% critical battery threshold"));
    }

    #[test]
    fn test_rule_planner_threshold_is_strict() {
        let mut rows = demo_rows();
        rows[1].data_uncertainty = 0.6;
        let cmd = RulePlanner::new().decide(&rows, &Mission::default());
        assert_eq!(cmd.action, Action::DoNothing);
    }

    #[test]
    fn test_rule_planner_first_node_wins_tie() {
        let mut rows = demo_rows();
        rows[0].data_uncertainty = 0.8;
        let cmd = RulePlanner::new().decide(&rows, &Mission::default());
        assert_eq!(cmd.target_node_id.as_deref(), Some("Node_42"));
        assert_eq!(cmd.new_policy, Some(SensePolicy::SenseLow));
    }

    #[test]
    fn test_rule_planner_empty_network() {
        let cmd = RulePlanner::new().decide(&[], &Mission::default());
        assert_eq!(cmd.action, Action::DoNothing);
        assert!(cmd.validate_shape().is_ok());
    }

    #[test]
    fn test_rule_planner_from_sync_context() {
        let planner = RulePlanner::new();
        let cmd = tokio_test::block_on(planner.plan(&demo_rows(), &Mission::default())).unwrap();
        assert_eq!(cmd.target_node_id.as_deref(), Some("Node_11"));
    }

    #[tokio::test]
    async fn test_llm_planner_accepts_valid_reply() {
        let provider = ScriptedProvider::new(vec![Ok(
            "```json\n{\"action\": \"WAKE_NODE\", \"target_node_id\": \"Node_11\", \"new_policy\": \"SENSE_HIGH\", \"bo_parameters\": {\"sampling_interval_s\": 6.0, \"tx_power_dbm\": 9.0}, \"reasoning\": \"stale data\"}\n```".into(),
        )]);
        let planner = LlmPlanner::with_config(provider, fast_config());

        let cmd = planner.plan(&demo_rows(), &Mission::default()).await.unwrap();
        assert_eq!(cmd.target_node_id.as_deref(), Some("Node_11"));
        assert_eq!(cmd.bo_parameters, Some(BoParameters::new(6.0, 9.0)));

        let requests = planner.provider().requests.lock().unwrap();
        assert!(requests[0].json_mode);
        assert!(requests[0].messages[1].content.contains("Node_11"));
        drop(requests);
        assert_eq!(planner.usage().total_calls, 1);
    }

    #[tokio::test]
    async fn test_llm_planner_corrects_constraint_violation() {
        let provider = ScriptedProvider::new(vec![
            Ok(r#"{"action": "WAKE_NODE", "target_node_id": "Node_11", "new_policy": "SENSE_HIGH", "reasoning": "r"}"#.into()),
            Ok(r#"{"action": "DO_NOTHING", "reasoning": "nothing eligible"}"#.into()),
        ]);
        let mut rows = demo_rows();
        rows[1].battery_percent = 10.0;

        let planner = LlmPlanner::with_config(provider, fast_config());
        let cmd = planner.plan(&rows, &Mission::default()).await.unwrap();
        assert_eq!(cmd.action, Action::DoNothing);

        let requests = planner.provider().requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        let retry = &requests[1].messages;
        assert_eq!(retry.len(), 4);
        assert!(retry[3].content.contains("rejected"));
    }

    #[tokio::test]
    async fn test_llm_planner_retries_rate_limit() {
        let provider = ScriptedProvider::new(vec![
            Err(ProviderError::RateLimited { retry_after: None }),
            Ok(r#"{"action": "DO_NOTHING", "reasoning": "ok"}"#.into()),
        ]);
        let planner = LlmPlanner::with_config(provider, fast_config());
        let cmd = planner.plan(&demo_rows(), &Mission::default()).await.unwrap();
        assert_eq!(cmd.action, Action::DoNothing);
        assert_eq!(planner.provider().request_count(), 2);
    }

    #[tokio::test]
    async fn test_llm_planner_gives_up_after_retries() {
        let provider = ScriptedProvider::new(vec![
            Ok("not json".into()),
            Ok("still not json".into()),
            Ok("nope".into()),
        ]);
        let planner = LlmPlanner::with_config(provider, fast_config());
        let err = planner.plan(&demo_rows(), &Mission::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailed);
        assert_eq!(err.context_value("attempts"), Some("3"));
        assert_eq!(planner.provider().request_count(), 3);
    }

    #[tokio::test]
    async fn test_llm_planner_does_not_retry_auth_failure() {
        let provider = ScriptedProvider::new(vec![Err(ProviderError::AuthenticationFailed)]);
        let planner = LlmPlanner::with_config(provider, fast_config());
        let err = planner.plan(&demo_rows(), &Mission::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderUnavailable);
        assert_eq!(planner.provider().request_count(), 1);
    }

    #[tokio::test]
    async fn test_fallback_planner() {
        let provider = ScriptedProvider::new(vec![Err(ProviderError::AuthenticationFailed)]);
        let planner = FallbackPlanner::new(
            LlmPlanner::with_config(provider, fast_config()),
            RulePlanner::new(),
        );
        let cmd = planner.plan(&demo_rows(), &Mission::default()).await.unwrap();
        assert_eq!(cmd.target_node_id.as_deref(), Some("Node_11"));
        assert_eq!(planner.name(), "scripted");
    }
}
