use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

use agentd_core::{
    merge_run_config, Configurable, ExecutionPath, Message, PathDeps, RunEvent,
};

use crate::service::{validate_input, ApiError, AppState, AuthedUser};
use crate::sse::{event_frame, sse_response, sse_stream, DONE_FRAME};

/// Health endpoint path.
pub const HEALTH_PATH: &str = "/health";
/// Fire-and-forget run endpoint path.
pub const RUNS_PATH: &str = "/runs";
/// Streaming run endpoint path.
pub const RUNS_STREAM_PATH: &str = "/runs/stream";

pub fn health_routes() -> Router<AppState> {
    Router::new().route(HEALTH_PATH, get(health))
}

/// Build run routes: create, stream, and the three schema endpoints.
pub fn run_routes() -> Router<AppState> {
    Router::new()
        .route(RUNS_PATH, post(create_run))
        .route(RUNS_STREAM_PATH, post(stream_run))
        .route("/runs/input_schema", get(input_schema))
        .route("/runs/output_schema", get(output_schema))
        .route("/runs/config_schema", get(config_schema))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(run_routes())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct RunPayload {
    thread_id: String,
    #[serde(default)]
    input: Option<Value>,
    #[serde(default)]
    config: Option<Value>,
}

struct PreparedRun {
    path: Arc<ExecutionPath>,
    messages: Vec<Message>,
    thread_id: Uuid,
}

/// Resolve a run request into an invokable path.
///
/// Ownership checks and configuration errors all surface here, before
/// anything is spawned or streamed.
async fn prepare_run(
    state: &AppState,
    user: &AuthedUser,
    payload: RunPayload,
) -> Result<PreparedRun, ApiError> {
    let thread_id = Uuid::parse_str(&payload.thread_id)
        .map_err(|_| ApiError::ThreadNotFound(payload.thread_id.clone()))?;
    let thread = state
        .store
        .get_thread(&user.0, thread_id)
        .await?
        .ok_or_else(|| ApiError::ThreadNotFound(payload.thread_id.clone()))?;
    let assistant = state
        .store
        .get_assistant(&user.0, thread.assistant_id)
        .await?
        .ok_or_else(|| ApiError::AssistantNotFound(thread.assistant_id.to_string()))?;

    let config = merge_run_config(
        &assistant.config,
        payload.config.as_ref(),
        &user.0,
        &thread.thread_id.to_string(),
        &assistant.assistant_id.to_string(),
    );
    let options = Configurable::from_config(&config)?;
    let deps = PathDeps {
        model: state.factory.model().to_string(),
        provider: state.provider.clone(),
        docs: state.docs.clone(),
    };
    let path = Arc::new(ExecutionPath::build(&options, &deps)?);

    let messages = match payload.input {
        Some(input) => {
            validate_input(&path.input_schema(), &input)?;
            serde_json::from_value(input)
                .map_err(|e| ApiError::BadRequest(format!("invalid input: {e}")))?
        }
        None => Vec::new(),
    };

    Ok(PreparedRun {
        path,
        messages,
        thread_id,
    })
}

/// Start a run in the background and acknowledge immediately.
async fn create_run(
    State(state): State<AppState>,
    user: AuthedUser,
    Json(payload): Json<RunPayload>,
) -> Result<Json<Value>, ApiError> {
    let run = prepare_run(&state, &user, payload).await?;
    let thread_id = run.thread_id;
    info!(%thread_id, mode = ?run.path.mode(), "starting background run");

    tokio::spawn(async move {
        if let Err(e) = run.path.invoke(run.messages).await {
            error!(%thread_id, error = %e, "background run failed");
        }
    });

    Ok(Json(serde_json::json!({ "status": "ok" })))
}

/// Start a run and stream its events as SSE frames, closing with a
/// `[DONE]` sentinel.
async fn stream_run(
    State(state): State<AppState>,
    user: AuthedUser,
    Json(payload): Json<RunPayload>,
) -> Result<Response, ApiError> {
    let run = prepare_run(&state, &user, payload).await?;
    let thread_id = run.thread_id;

    let (tx, rx) = mpsc::channel::<Bytes>(32);
    tokio::spawn(async move {
        let started = RunEvent::RunStarted {
            thread_id: thread_id.to_string(),
        };
        if let Some(frame) = event_frame(&started) {
            if tx.send(frame).await.is_err() {
                return;
            }
        }
        let mut events = run.path.stream(run.messages);
        while let Some(event) = events.next().await {
            let Some(frame) = event_frame(&event) else {
                continue;
            };
            if tx.send(frame).await.is_err() {
                // Client went away; stop driving the run.
                return;
            }
        }
        let _ = tx.send(Bytes::from_static(DONE_FRAME)).await;
    });

    Ok(sse_response(sse_stream(rx)))
}

async fn input_schema() -> Json<Value> {
    Json(agentd_core::agent::input_schema())
}

async fn output_schema() -> Json<Value> {
    Json(agentd_core::agent::output_schema())
}

async fn config_schema() -> Json<Value> {
    Json(agentd_core::agent::config_schema())
}
