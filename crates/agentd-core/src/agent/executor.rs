//! Execution paths and the tool-call loop.
//!
//! A path is built per request from the merged configuration: selection is
//! a strategy table over [`AgentMode`], evaluated once, producing an
//! immutable, ready-to-invoke value.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use genai::chat::ChatRequest;
use genai::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::agent::config::{AgentMode, ConfigError, Configurable};
use crate::agent::convert::build_request;
use crate::agent::events::RunEvent;
use crate::agent::schemas;
use crate::message::{Message, ToolCall};
use crate::storage::DocumentStore;
use crate::tool::{
    describe_tool, resolve_tools, validate_against_schema, ProviderToolSpec, Tool,
    ToolResolveContext,
};

/// Upper bound on tool-call rounds, guarding against runaway loops.
pub const RECURSION_LIMIT: usize = 50;

const RETRIEVAL_CONTEXT_LIMIT: usize = 4;

/// Run execution errors.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("model call failed: {0}")]
    Llm(String),

    #[error("recursion limit of {0} reached without a final answer")]
    RecursionLimit(usize),

    #[error("retrieval failed: {0}")]
    Retrieval(String),
}

/// What one model call produced.
#[derive(Debug, Clone, Default)]
pub struct ChatOutcome {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

/// The model call seam. The genai client implements it; tests substitute
/// scripted providers.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn exec_chat(&self, model: &str, request: ChatRequest) -> Result<ChatOutcome, RunError>;
}

#[async_trait]
impl ChatProvider for Client {
    async fn exec_chat(&self, model: &str, request: ChatRequest) -> Result<ChatOutcome, RunError> {
        let response = Client::exec_chat(self, model, request, None)
            .await
            .map_err(|e| RunError::Llm(e.to_string()))?;
        let text = response
            .first_text()
            .map(str::to_string)
            .unwrap_or_default();
        let tool_calls = response
            .tool_calls()
            .into_iter()
            .map(|tc| ToolCall::new(&tc.call_id, &tc.fn_name, tc.fn_arguments.clone()))
            .collect();
        Ok(ChatOutcome { text, tool_calls })
    }
}

/// Collaborators a path is built against.
#[derive(Clone)]
pub struct PathDeps {
    pub model: String,
    pub provider: Arc<dyn ChatProvider>,
    pub docs: Arc<dyn DocumentStore>,
}

struct Retriever {
    docs: Arc<dyn DocumentStore>,
    namespaces: [String; 2],
}

impl Retriever {
    async fn context_for(&self, messages: &[Message]) -> Result<Option<Message>, RunError> {
        let Some(query) = messages
            .iter()
            .rev()
            .find(|m| m.role == crate::message::Role::User)
            .map(|m| m.content.as_str())
        else {
            return Ok(None);
        };
        let documents = self
            .docs
            .search(&self.namespaces, query, RETRIEVAL_CONTEXT_LIMIT)
            .await
            .map_err(|e| RunError::Retrieval(e.to_string()))?;
        if documents.is_empty() {
            return Ok(None);
        }
        let mut context = String::from("Relevant documents:\n");
        for doc in &documents {
            context.push('\n');
            context.push_str(&doc.content);
        }
        Ok(Some(Message::system(context)))
    }
}

enum RoundOutcome {
    Finished,
    Interrupted,
    Continue,
}

/// A compiled, invokable execution path.
pub struct ExecutionPath {
    mode: AgentMode,
    model: String,
    provider: Arc<dyn ChatProvider>,
    system_message: String,
    tools: Vec<Arc<dyn Tool>>,
    tool_specs: Vec<ProviderToolSpec>,
    retriever: Option<Retriever>,
    interrupt_before_action: bool,
    max_rounds: usize,
}

impl std::fmt::Debug for ExecutionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionPath")
            .field("mode", &self.mode)
            .field("model", &self.model)
            .field("system_message", &self.system_message)
            .field("tools", &self.tools)
            .field("tool_specs", &self.tool_specs)
            .field("interrupt_before_action", &self.interrupt_before_action)
            .field("max_rounds", &self.max_rounds)
            .finish_non_exhaustive()
    }
}

impl ExecutionPath {
    /// Bind an execution path for the given configuration.
    ///
    /// Fails with a configuration error before any model or storage call
    /// when the selected mode's requirements are not met.
    pub fn build(options: &Configurable, deps: &PathDeps) -> Result<Self, ConfigError> {
        match options.mode {
            AgentMode::Chatbot => Ok(Self {
                mode: options.mode,
                model: deps.model.clone(),
                provider: deps.provider.clone(),
                system_message: options.system_message.clone(),
                tools: Vec::new(),
                tool_specs: Vec::new(),
                retriever: None,
                interrupt_before_action: false,
                max_rounds: 1,
            }),
            AgentMode::Retrieval => {
                let (assistant_id, thread_id) =
                    match (options.assistant_id.as_deref(), options.thread_id.as_deref()) {
                        (Some(a), Some(t)) => (a, t),
                        _ => {
                            return Err(ConfigError::MissingField(
                                "assistant_id and thread_id are required for the retrieval mode"
                                    .to_string(),
                            ))
                        }
                    };
                Ok(Self {
                    mode: options.mode,
                    model: deps.model.clone(),
                    provider: deps.provider.clone(),
                    system_message: options.system_message.clone(),
                    tools: Vec::new(),
                    tool_specs: Vec::new(),
                    retriever: Some(Retriever {
                        docs: deps.docs.clone(),
                        namespaces: [assistant_id.to_string(), thread_id.to_string()],
                    }),
                    interrupt_before_action: false,
                    max_rounds: 1,
                })
            }
            AgentMode::Agent => {
                let tools = resolve_tools(
                    &options.tools,
                    &ToolResolveContext {
                        assistant_id: options.assistant_id.as_deref(),
                        thread_id: options.thread_id.as_deref(),
                        retrieval_description: &options.retrieval_description,
                        docs: deps.docs.clone(),
                    },
                )?;
                let tool_specs = tools
                    .iter()
                    .map(|t| describe_tool(t.as_ref()))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?;
                Ok(Self {
                    mode: options.mode,
                    model: deps.model.clone(),
                    provider: deps.provider.clone(),
                    system_message: options.system_message.clone(),
                    tools,
                    tool_specs,
                    retriever: None,
                    interrupt_before_action: options.interrupt_before_action,
                    max_rounds: RECURSION_LIMIT,
                })
            }
        }
    }

    pub fn mode(&self) -> AgentMode {
        self.mode
    }

    /// Schema of the input this path accepts.
    pub fn input_schema(&self) -> Value {
        schemas::input_schema()
    }

    pub fn output_schema(&self) -> Value {
        schemas::output_schema()
    }

    pub fn config_schema(&self) -> Value {
        schemas::config_schema()
    }

    /// Run to completion and return the messages produced.
    pub async fn invoke(&self, mut messages: Vec<Message>) -> Result<Vec<Message>, RunError> {
        self.prepare(&mut messages).await?;
        let mut produced = Vec::new();
        let mut rounds = 0;
        loop {
            rounds += 1;
            let (appended, outcome) = self.next_round(&mut messages).await?;
            produced.extend(appended);
            match outcome {
                RoundOutcome::Finished | RoundOutcome::Interrupted => return Ok(produced),
                RoundOutcome::Continue => {
                    if rounds >= self.max_rounds {
                        return Err(RunError::RecursionLimit(self.max_rounds));
                    }
                }
            }
        }
    }

    /// Run and emit incremental execution state as a stream of events.
    ///
    /// The stream always terminates with either `Done` or `Error`.
    pub fn stream(
        self: Arc<Self>,
        mut messages: Vec<Message>,
    ) -> Pin<Box<dyn Stream<Item = RunEvent> + Send>> {
        Box::pin(async_stream::stream! {
            if let Err(e) = self.prepare(&mut messages).await {
                yield RunEvent::Error { message: e.to_string() };
                return;
            }
            let mut rounds = 0;
            loop {
                rounds += 1;
                match self.next_round(&mut messages).await {
                    Ok((appended, outcome)) => {
                        for message in appended {
                            yield RunEvent::Message { message };
                        }
                        match outcome {
                            RoundOutcome::Finished | RoundOutcome::Interrupted => {
                                yield RunEvent::Done;
                                return;
                            }
                            RoundOutcome::Continue => {
                                if rounds >= self.max_rounds {
                                    yield RunEvent::Error {
                                        message: RunError::RecursionLimit(self.max_rounds)
                                            .to_string(),
                                    };
                                    return;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        yield RunEvent::Error { message: e.to_string() };
                        return;
                    }
                }
            }
        })
    }

    /// Inject retrieval context ahead of the first model call.
    async fn prepare(&self, messages: &mut Vec<Message>) -> Result<(), RunError> {
        if let Some(retriever) = &self.retriever {
            if let Some(context) = retriever.context_for(messages).await? {
                messages.push(context);
            }
        }
        Ok(())
    }

    /// One model call plus any resulting tool executions.
    ///
    /// Returns the messages appended this round and whether to keep going.
    async fn next_round(
        &self,
        messages: &mut Vec<Message>,
    ) -> Result<(Vec<Message>, RoundOutcome), RunError> {
        let request: ChatRequest =
            build_request(&self.system_message, messages, &self.tool_specs);
        let outcome = self.provider.exec_chat(&self.model, request).await?;

        let mut appended = Vec::new();
        if outcome.tool_calls.is_empty() {
            let message = Message::assistant(outcome.text);
            messages.push(message.clone());
            appended.push(message);
            return Ok((appended, RoundOutcome::Finished));
        }

        let message = Message::assistant_with_tool_calls(outcome.text, outcome.tool_calls.clone());
        messages.push(message.clone());
        appended.push(message);

        if self.interrupt_before_action {
            debug!(pending = outcome.tool_calls.len(), "interrupting before tool execution");
            return Ok((appended, RoundOutcome::Interrupted));
        }

        for call in &outcome.tool_calls {
            let content = self.execute_tool(call).await;
            let message = Message::tool(&call.id, content);
            messages.push(message.clone());
            appended.push(message);
        }
        Ok((appended, RoundOutcome::Continue))
    }

    /// Tool failures become tool-message content so the model can react;
    /// they do not abort the run.
    async fn execute_tool(&self, call: &ToolCall) -> String {
        let Some(tool) = self
            .tools
            .iter()
            .find(|t| t.descriptor().name == call.name)
        else {
            return format!("tool `{}` is not available", call.name);
        };
        if let Err(e) = validate_against_schema(&tool.descriptor().parameters, &call.arguments) {
            return format!("tool `{}` rejected the arguments: {e}", call.name);
        }
        match tool.execute(call.arguments.clone()).await {
            Ok(result) => result.to_json().to_string(),
            Err(e) => format!("tool `{}` failed: {e}", call.name),
        }
    }
}
