//! JSON Schemas for the run API's introspection endpoints.

use serde_json::Value;

use crate::agent::config::Configurable;
use crate::message::Message;

/// Schema of the input accepted by every execution path: a sequence of
/// chat messages.
pub fn input_schema() -> Value {
    serde_json::to_value(schemars::schema_for!(Vec<Message>)).unwrap_or_default()
}

/// Schema of the output produced by a run.
pub fn output_schema() -> Value {
    serde_json::to_value(schemars::schema_for!(Vec<Message>)).unwrap_or_default()
}

/// Schema of the per-run configurable fields.
pub fn config_schema() -> Value {
    serde_json::to_value(schemars::schema_for!(Configurable)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_schema_describes_a_message_array() {
        let schema = input_schema();
        assert_eq!(schema["type"], "array");
    }

    #[test]
    fn config_schema_lists_configurable_fields() {
        let schema = config_schema();
        let text = schema.to_string();
        for field in [
            "mode",
            "system_message",
            "assistant_id",
            "thread_id",
            "tools",
            "retrieval_description",
            "interrupt_before_action",
        ] {
            assert!(text.contains(field), "missing {field}");
        }
    }
}
