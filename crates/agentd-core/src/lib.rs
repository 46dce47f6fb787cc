//! Domain library for the agentd run server.
//!
//! Everything the HTTP layer needs to serve a run lives here: the message
//! model, the tool contract and builtin tools, the provider-shaped tool
//! schema adapter, the Ollama model factory, agent mode selection with its
//! run executor, and the thread/assistant storage contract with Postgres
//! and in-memory adapters.

pub mod agent;
pub mod message;
pub mod model;
pub mod storage;
pub mod tool;

pub use agent::{
    merge_run_config, AgentMode, ChatOutcome, ChatProvider, ConfigError, Configurable,
    ExecutionPath, PathDeps, RunError, RunEvent, DEFAULT_SYSTEM_MESSAGE, RECURSION_LIMIT,
};
pub use message::{Message, Role, ToolCall};
pub use model::{ModelFactory, ModelSettings};
pub use storage::{
    Assistant, Document, DocumentStore, MemoryStore, PgStore, PostgresSettings, StoreError,
    Thread, ThreadStore,
};
pub use tool::{
    describe_tool, provider_spec_from_schema, to_genai_tool, ProviderToolSpec, SchemaError, Tool,
    ToolDescriptor, ToolError, ToolKind, ToolResult, ToolSpec,
};
