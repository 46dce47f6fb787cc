use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use agentd_core::{
    ChatProvider, ConfigError, DocumentStore, ModelFactory, StoreError, ThreadStore,
};

/// Shared application state.
///
/// The model factory lives here rather than in a process-wide global, so
/// tests and embedders can run isolated instances side by side.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ThreadStore>,
    pub docs: Arc<dyn DocumentStore>,
    pub factory: Arc<ModelFactory>,
    pub provider: Arc<dyn ChatProvider>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ThreadStore>,
        docs: Arc<dyn DocumentStore>,
        factory: Arc<ModelFactory>,
    ) -> Self {
        let provider: Arc<dyn ChatProvider> = factory.client();
        Self {
            store,
            docs,
            factory,
            provider,
        }
    }

    /// Swap the model provider, keeping everything else. Used by tests.
    pub fn with_provider(mut self, provider: Arc<dyn ChatProvider>) -> Self {
        self.provider = provider;
        self
    }
}

/// One field-level validation failure, in the shape validation middleware
/// conventionally reports: a path into the request plus a message.
#[derive(Debug, Serialize)]
pub struct FieldError {
    pub loc: Vec<Value>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("thread not found: {0}")]
    ThreadNotFound(String),

    #[error("assistant not found: {0}")]
    AssistantNotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid run input")]
    Validation(Vec<FieldError>),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({ "detail": errors })),
            )
                .into_response(),
            other => {
                let code = match &other {
                    ApiError::ThreadNotFound(_) | ApiError::AssistantNotFound(_) => {
                        StatusCode::NOT_FOUND
                    }
                    ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
                    ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                    ApiError::Validation(_) => unreachable!(),
                    ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let body = Json(serde_json::json!({ "error": other.to_string() }));
                (code, body).into_response()
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<ConfigError> for ApiError {
    fn from(e: ConfigError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

/// Caller identity, taken from the `x-user-id` header.
///
/// Authentication proper is expected to happen upstream; this is only the
/// seam where the verified identity enters the handlers.
#[derive(Debug, Clone)]
pub struct AuthedUser(pub String);

impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("missing x-user-id header".to_string()))?;
        Ok(AuthedUser(user_id.to_string()))
    }
}

/// Validate a run's `input` against the path's input schema.
///
/// Failures are reported per field with a `loc` path rooted at
/// `["body", "input"]`.
pub fn validate_input(schema: &Value, input: &Value) -> Result<(), ApiError> {
    let validator = jsonschema::validator_for(schema)
        .map_err(|e| ApiError::Internal(format!("invalid input schema: {e}")))?;

    let errors: Vec<FieldError> = validator
        .iter_errors(input)
        .map(|err| {
            let mut loc: Vec<Value> = vec![Value::from("body"), Value::from("input")];
            for segment in err.instance_path.to_string().split('/') {
                if segment.is_empty() {
                    continue;
                }
                match segment.parse::<u64>() {
                    Ok(index) => loc.push(Value::from(index)),
                    Err(_) => loc.push(Value::from(segment)),
                }
            }
            FieldError {
                loc,
                msg: err.to_string(),
                kind: "value_error".to_string(),
            }
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validate_input_accepts_matching_values() {
        let schema = json!({
            "type": "array",
            "items": {"type": "object", "required": ["role"]}
        });
        assert!(validate_input(&schema, &json!([{"role": "user"}])).is_ok());
    }

    #[test]
    fn validate_input_reports_field_locations() {
        let schema = json!({
            "type": "array",
            "items": {"type": "object", "required": ["role"]}
        });
        let err = validate_input(&schema, &json!([{}])).unwrap_err();
        let ApiError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].loc[0], json!("body"));
        assert_eq!(errors[0].loc[1], json!("input"));
        assert_eq!(errors[0].loc[2], json!(0));
    }

    #[test]
    fn validation_error_serializes_with_detail_array() {
        let err = ApiError::Validation(vec![FieldError {
            loc: vec![json!("body"), json!("input")],
            msg: "bad".to_string(),
            kind: "value_error".to_string(),
        }]);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
