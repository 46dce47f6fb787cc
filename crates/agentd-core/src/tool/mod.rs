//! Tool contract, the provider-shaped schema adapter, and builtin tools.

mod builtins;
mod contract;
mod describe;

pub use builtins::{resolve_tools, RetrievalTool, ToolKind, ToolResolveContext, ToolSpec,
    WebFetchTool, WebSearchTool, WikipediaTool, RETRIEVAL_DESCRIPTION};
pub use contract::{validate_against_schema, Tool, ToolDescriptor, ToolError, ToolResult};
pub use describe::{describe_tool, provider_spec_from_schema, to_genai_tool, ProviderToolSpec,
    SchemaError};
