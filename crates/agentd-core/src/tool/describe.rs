//! Provider-shaped tool descriptions.
//!
//! The model provider wants tools described as
//! `{name, description, properties, required}`. This module derives that
//! shape from a tool's declared JSON Schema. Pure functions, no side
//! effects.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::tool::contract::{Tool, ToolDescriptor};

/// Errors raised while reshaping a tool schema for the provider.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The schema is not a shape we know how to describe. The message
    /// carries the offending value.
    #[error("unsupported tool schema for `{name}`: {value}")]
    Unsupported { name: String, value: Value },
}

/// A tool description in the provider's wire shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderToolSpec {
    pub name: String,
    pub description: String,
    /// Parameter property mapping, copied verbatim from the source schema.
    pub properties: Value,
    /// Required parameter names, present only when the source declares them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

/// Derive a provider spec from a raw parameter schema.
///
/// The schema must be a JSON object whose `properties` member is an object.
/// A `required` member, when present, must be an array of strings; it is
/// carried over as-is and omitted otherwise.
pub fn provider_spec_from_schema(
    name: impl Into<String>,
    description: impl Into<String>,
    schema: &Value,
) -> Result<ProviderToolSpec, SchemaError> {
    let name = name.into();

    let unsupported = |name: &str| SchemaError::Unsupported {
        name: name.to_string(),
        value: schema.clone(),
    };

    let obj = schema.as_object().ok_or_else(|| unsupported(&name))?;

    let properties = match obj.get("properties") {
        Some(props) if props.is_object() => props.clone(),
        Some(_) => return Err(unsupported(&name)),
        None => Value::Object(serde_json::Map::new()),
    };

    let required = match obj.get("required") {
        None => None,
        Some(Value::Array(items)) => {
            let mut names = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str() {
                    Some(s) => names.push(s.to_string()),
                    None => return Err(unsupported(&name)),
                }
            }
            Some(names)
        }
        Some(_) => return Err(unsupported(&name)),
    };

    Ok(ProviderToolSpec {
        name,
        description: description.into(),
        properties,
        required,
    })
}

/// Derive a provider spec from a tool's descriptor.
pub fn describe_tool(tool: &dyn Tool) -> Result<ProviderToolSpec, SchemaError> {
    let ToolDescriptor {
        name,
        description,
        parameters,
    } = tool.descriptor();
    provider_spec_from_schema(name, description, &parameters)
}

/// Convert a provider spec to a genai tool for the chat request.
pub fn to_genai_tool(spec: &ProviderToolSpec) -> genai::chat::Tool {
    let mut schema = serde_json::json!({
        "type": "object",
        "properties": spec.properties,
    });
    if let Some(required) = &spec.required {
        schema["required"] = serde_json::json!(required);
    }
    genai::chat::Tool::new(&spec.name)
        .with_description(&spec.description)
        .with_schema(schema)
}
