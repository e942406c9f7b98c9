//! # Command Schema and Prompts
//!
//! Everything a model needs to produce a valid command: the JSON Schema of
//! the output, a system prompt that embeds it, and the per-cycle prompt
//! carrying the mission goal and the network state.

use serde_json::{json, Value};

const ROLE: &str =
    "You are the Large Language Model-Driven Dynamic Edge Compute Orchestrator (LLM-DECO).";

/// JSON Schema the model's reply must satisfy.
pub fn command_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "action": {
                "type": "string",
                "enum": ["WAKE_NODE", "DO_NOTHING"],
                "description": "The high-level action to take. Must be 'WAKE_NODE' or 'DO_NOTHING'."
            },
            "target_node_id": {
                "type": "string",
                "description": "The node_id (e.g., 'Node_42') to send the wake-up signal to. Required if action is WAKE_NODE."
            },
            "new_policy": {
                "type": "string",
                "enum": ["SENSE_LOW", "SENSE_HIGH"],
                "description": "The sensing policy the node should run after waking. Must be 'SENSE_LOW' or 'SENSE_HIGH'."
            },
            "bo_parameters": {
                "type": "object",
                "description": "Optimal numerical settings found by Bayesian Optimisation.",
                "properties": {
                    "sampling_interval_s": {
                        "type": "number",
                        "description": "The optimised sampling interval in seconds."
                    },
                    "tx_power_dbm": {
                        "type": "number",
                        "description": "The optimised transmission power in dBm."
                    }
                },
                "required": ["sampling_interval_s", "tx_power_dbm"]
            },
            "reasoning": {
                "type": "string",
                "description": "A brief explanation of the decision based on mission goal, energy, and uncertainty."
            }
        },
        "required": ["action", "reasoning"]
    })
}

/// System prompt: role plus the output contract.
pub fn system_prompt() -> String {
    let schema = serde_json::to_string_pretty(&command_schema()).unwrap_or_default();

    let mut out = String::new();
    out.push_str(ROLE);
    out.push('\n');
    out.push_str("You control a network of battery-powered IoT sensor nodes that sleep until woken.\n\n");
    out.push_str("## Output Contract\n\n");
    out.push_str("Reply with exactly one JSON object and nothing else. It must satisfy this JSON Schema:\n\n");
    out.push_str(&schema);
    out.push('\n');
    out
}

/// Per-cycle prompt with the role, the mission goal and the current network state.
pub fn build_prompt(network_state_json: &str, mission_goal: &str) -> String {
    format!(
        r#"{ROLE}
Your task is to analyse the current state of the IoT network and determine the optimal single action.
Your goal is to satisfy the MISSION GOAL while prioritising network longevity.

---
MISSION GOAL: "{mission_goal}"
---
CURRENT NETWORK STATE (JSON Array):
{network_state_json}
---

INSTRUCTIONS:
1. Analyse the 'data_uncertainty' and 'battery_percent' for all nodes.
2. Select ONE node to wake if necessary ('action': 'WAKE_NODE'), or 'DO_NOTHING'.
3. If WAKE_NODE, choose 'new_policy' ('SENSE_LOW' or 'SENSE_HIGH'). Prioritise nodes with high 'harvest_potential' for 'SENSE_HIGH'.
4. Provide the output ONLY as a JSON object that strictly adheres to the provided JSON Schema.
5. The 'bo_parameters' should contain the final numerical output from your internal Bayesian Optimisation routine (use plausible, realistic numbers).
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_required_fields() {
        let schema = command_schema();
        assert_eq!(schema["required"], json!(["action", "reasoning"]));
        assert_eq!(schema["properties"]["action"]["enum"][0], "WAKE_NODE");
        assert!(schema["properties"]["bo_parameters"]["properties"]["tx_power_dbm"].is_object());
    }

    #[test]
    fn test_system_prompt_embeds_schema() {
        let prompt = system_prompt();
        assert!(prompt.contains("LLM-DECO"));
        assert!(prompt.contains("\"sampling_interval_s\""));
    }

    #[test]
    fn test_build_prompt() {
        let prompt = build_prompt("[{\"node_id\": \"Node_11\"}]", "Keep data fresh");
        assert!(prompt.starts_with("You are the Large Language Model-Driven Dynamic Edge Compute Orchestrator (LLM-DECO)."));
        assert!(prompt.contains("MISSION GOAL: \"Keep data fresh\""));
        assert!(prompt.contains("Node_11"));
        assert!(prompt.contains("5. The 'bo_parameters'"));
    }
}
