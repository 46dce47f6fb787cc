//! Run configuration: mode selection, merging, and the configurable fields.

use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::tool::{ToolSpec, RETRIEVAL_DESCRIPTION};

/// System message used when the configuration does not supply one.
pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful assistant.";

/// Which execution path a run is bound to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    #[default]
    Chatbot,
    Retrieval,
    Agent,
}

impl FromStr for AgentMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chatbot" => Ok(Self::Chatbot),
            "retrieval" => Ok(Self::Retrieval),
            "agent" => Ok(Self::Agent),
            other => Err(ConfigError::InvalidMode(other.to_string())),
        }
    }
}

/// Configuration selection errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid agent mode: {0}")]
    InvalidMode(String),

    #[error("missing required configuration: {0}")]
    MissingField(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_system_message() -> String {
    DEFAULT_SYSTEM_MESSAGE.to_string()
}

fn default_retrieval_description() -> String {
    RETRIEVAL_DESCRIPTION.to_string()
}

/// Per-run configurable fields, parsed from the merged config's
/// `configurable` object. Immutable once parsed; the execution path is
/// rebuilt from it on every request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Configurable {
    #[serde(default)]
    pub mode: AgentMode,
    #[serde(default = "default_system_message")]
    pub system_message: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub assistant_id: Option<String>,
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
    #[serde(default = "default_retrieval_description")]
    pub retrieval_description: String,
    /// Stop before executing tool calls, leaving them pending.
    #[serde(default)]
    pub interrupt_before_action: bool,
}

impl Default for Configurable {
    fn default() -> Self {
        Self {
            mode: AgentMode::default(),
            system_message: default_system_message(),
            user_id: None,
            thread_id: None,
            assistant_id: None,
            tools: Vec::new(),
            retrieval_description: default_retrieval_description(),
            interrupt_before_action: false,
        }
    }
}

impl Configurable {
    /// Parse the configurable fields out of a merged run config.
    ///
    /// An unknown `mode` string fails with [`ConfigError::InvalidMode`]
    /// before anything else is looked at.
    pub fn from_config(config: &Value) -> Result<Self, ConfigError> {
        let configurable = match config.get("configurable") {
            Some(v) => v.clone(),
            None => Value::Object(Map::new()),
        };

        if let Some(mode) = configurable.get("mode") {
            let mode = mode
                .as_str()
                .ok_or_else(|| ConfigError::Invalid("`mode` must be a string".to_string()))?;
            AgentMode::from_str(mode)?;
        }

        serde_json::from_value(configurable).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

/// Merge the assistant's stored config with the request's overrides.
///
/// The injected identifiers always win over any caller-supplied value of
/// the same key.
pub fn merge_run_config(
    assistant_config: &Value,
    request_config: Option<&Value>,
    user_id: &str,
    thread_id: &str,
    assistant_id: &str,
) -> Value {
    let mut config = assistant_config.as_object().cloned().unwrap_or_default();
    let mut configurable = config
        .get("configurable")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    if let Some(overrides) = request_config
        .and_then(|c| c.get("configurable"))
        .and_then(Value::as_object)
    {
        for (key, value) in overrides {
            configurable.insert(key.clone(), value.clone());
        }
    }

    configurable.insert("user_id".to_string(), Value::String(user_id.to_string()));
    configurable.insert("thread_id".to_string(), Value::String(thread_id.to_string()));
    configurable.insert(
        "assistant_id".to_string(),
        Value::String(assistant_id.to_string()),
    );

    config.insert("configurable".to_string(), Value::Object(configurable));
    Value::Object(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn injected_identifiers_always_win() {
        let assistant_config = json!({
            "configurable": {
                "mode": "chatbot",
                "user_id": "stored-user",
                "system_message": "stored prompt"
            }
        });
        let request_config = json!({
            "configurable": {
                "user_id": "sneaky",
                "thread_id": "sneaky",
                "assistant_id": "sneaky",
                "system_message": "override prompt"
            }
        });

        let merged = merge_run_config(
            &assistant_config,
            Some(&request_config),
            "real-user",
            "real-thread",
            "real-assistant",
        );
        let c = &merged["configurable"];
        assert_eq!(c["user_id"], "real-user");
        assert_eq!(c["thread_id"], "real-thread");
        assert_eq!(c["assistant_id"], "real-assistant");
        // Non-identifier overrides do apply.
        assert_eq!(c["system_message"], "override prompt");
    }

    #[test]
    fn non_configurable_keys_survive_the_merge() {
        let assistant_config = json!({
            "recursion_limit": 50,
            "configurable": { "mode": "agent" }
        });
        let merged = merge_run_config(&assistant_config, None, "u", "t", "a");
        assert_eq!(merged["recursion_limit"], 50);
        assert_eq!(merged["configurable"]["mode"], "agent");
    }

    #[test]
    fn unknown_mode_is_an_invalid_mode_error() {
        let config = json!({ "configurable": { "mode": "oracle" } });
        let err = Configurable::from_config(&config).unwrap_err();
        match err {
            ConfigError::InvalidMode(mode) => assert_eq!(mode, "oracle"),
            other => panic!("expected InvalidMode, got {other:?}"),
        }
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let parsed = Configurable::from_config(&json!({})).unwrap();
        assert_eq!(parsed.mode, AgentMode::Chatbot);
        assert_eq!(parsed.system_message, DEFAULT_SYSTEM_MESSAGE);
        assert!(parsed.tools.is_empty());
        assert!(!parsed.interrupt_before_action);
    }

    #[test]
    fn parses_a_full_agent_config() {
        let config = json!({
            "configurable": {
                "mode": "agent",
                "system_message": "be terse",
                "assistant_id": "a1",
                "thread_id": "t1",
                "tools": [{"type": "wikipedia"}, {"type": "retrieval"}],
                "interrupt_before_action": true
            }
        });
        let parsed = Configurable::from_config(&config).unwrap();
        assert_eq!(parsed.mode, AgentMode::Agent);
        assert_eq!(parsed.tools.len(), 2);
        assert!(parsed.interrupt_before_action);
        assert_eq!(parsed.retrieval_description, RETRIEVAL_DESCRIPTION);
    }
}
