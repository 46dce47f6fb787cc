//! Builtin tool kinds and their constructors.
//!
//! Tool selection is a tagged enum resolved through an exhaustive match:
//! each kind knows how to construct its instances, and a single requested
//! kind may expand into more than one tool (the `web` kind yields both a
//! search and a fetch tool).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::agent::ConfigError;
use crate::storage::DocumentStore;
use crate::tool::contract::{Tool, ToolDescriptor, ToolError, ToolResult};

/// Default description for the retrieval tool, overridable per request.
pub const RETRIEVAL_DESCRIPTION: &str = "Can be used to look up information that was uploaded to this assistant.\n\
If the user is referencing particular files, that is often a good hint that information may be here.\n\
If the user asks a vague question, they are likely meaning to look up info from this retriever, and you should call it!";

const FETCH_MAX_CHARS: usize = 16 * 1024;
const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

/// The tool kinds an assistant configuration may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Retrieval,
    Wikipedia,
    Web,
}

/// One requested tool: a kind plus its optional per-tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: ToolKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,
}

impl ToolSpec {
    pub fn new(kind: ToolKind) -> Self {
        Self { kind, config: None }
    }

    fn config_str(&self, key: &str) -> Option<&str> {
        self.config.as_ref()?.get(key)?.as_str()
    }
}

/// Identifiers and collaborators available to tool constructors.
pub struct ToolResolveContext<'a> {
    pub assistant_id: Option<&'a str>,
    pub thread_id: Option<&'a str>,
    pub retrieval_description: &'a str,
    pub docs: Arc<dyn DocumentStore>,
}

/// Resolve requested tool specs into tool instances.
///
/// Fails before any model or storage call when a kind's requirements are
/// not met (retrieval needs both the assistant id and the thread id).
pub fn resolve_tools(
    specs: &[ToolSpec],
    ctx: &ToolResolveContext<'_>,
) -> Result<Vec<Arc<dyn Tool>>, ConfigError> {
    let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
    for spec in specs {
        match spec.kind {
            ToolKind::Retrieval => {
                let (assistant_id, thread_id) = match (ctx.assistant_id, ctx.thread_id) {
                    (Some(a), Some(t)) => (a, t),
                    _ => {
                        return Err(ConfigError::MissingField(
                            "assistant_id and thread_id must be provided if the retrieval tool is used"
                                .to_string(),
                        ))
                    }
                };
                tools.push(Arc::new(RetrievalTool::new(
                    ctx.docs.clone(),
                    [assistant_id.to_string(), thread_id.to_string()],
                    ctx.retrieval_description,
                )));
            }
            ToolKind::Wikipedia => {
                tools.push(Arc::new(WikipediaTool::new(
                    http_client(spec)?,
                    spec.config_str("endpoint")
                        .unwrap_or(WikipediaTool::DEFAULT_ENDPOINT),
                )));
            }
            // Expands into two instances: search and fetch.
            ToolKind::Web => {
                let client = http_client(spec)?;
                tools.push(Arc::new(WebSearchTool::new(
                    client.clone(),
                    spec.config_str("endpoint")
                        .unwrap_or(WebSearchTool::DEFAULT_ENDPOINT),
                )));
                tools.push(Arc::new(WebFetchTool::new(client)));
            }
        }
    }
    Ok(tools)
}

fn http_client(spec: &ToolSpec) -> Result<reqwest::Client, ConfigError> {
    let mut builder = reqwest::Client::builder().timeout(HTTP_TIMEOUT);
    if let Some(ua) = spec.config_str("user_agent") {
        builder = builder.user_agent(ua.to_string());
    }
    builder
        .build()
        .map_err(|e| ConfigError::Invalid(format!("failed to build tool http client: {e}")))
}

/// Looks up documents uploaded for this assistant or thread.
pub struct RetrievalTool {
    docs: Arc<dyn DocumentStore>,
    namespaces: [String; 2],
    description: String,
}

impl RetrievalTool {
    pub fn new(
        docs: Arc<dyn DocumentStore>,
        namespaces: [String; 2],
        description: impl Into<String>,
    ) -> Self {
        Self {
            docs,
            namespaces,
            description: description.into(),
        }
    }
}

#[async_trait]
impl Tool for RetrievalTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("retrieval", &self.description).with_parameters(json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to look up in the uploaded documents"
                }
            },
            "required": ["query"]
        }))
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("`query` must be a string".to_string()))?;
        let documents = self
            .docs
            .search(&self.namespaces, query, 4)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        let contents: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
        Ok(ToolResult::success(
            "retrieval",
            json!({ "documents": contents }),
        ))
    }
}

/// Searches Wikipedia through the opensearch endpoint.
pub struct WikipediaTool {
    client: reqwest::Client,
    endpoint: String,
}

impl WikipediaTool {
    pub const DEFAULT_ENDPOINT: &'static str = "https://en.wikipedia.org/w/api.php";

    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Tool for WikipediaTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("wikipedia", "Search for a query on Wikipedia").with_parameters(json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search term" }
            },
            "required": ["query"]
        }))
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("`query` must be a string".to_string()))?;
        let body: Value = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("action", "opensearch"),
                ("search", query),
                ("limit", "5"),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?
            .json()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        Ok(ToolResult::success("wikipedia", body))
    }
}

/// Web search via the DuckDuckGo instant-answer API.
pub struct WebSearchTool {
    client: reqwest::Client,
    endpoint: String,
}

impl WebSearchTool {
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.duckduckgo.com/";

    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("web_search", "Search the web for a query").with_parameters(json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search term" }
            },
            "required": ["query"]
        }))
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("`query` must be a string".to_string()))?;
        let body: Value = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("format", "json"), ("no_html", "1")])
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?
            .json()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        Ok(ToolResult::success("web_search", body))
    }
}

/// Fetches a web page and returns its (truncated) text body.
pub struct WebFetchTool {
    client: reqwest::Client,
}

impl WebFetchTool {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("web_fetch", "Fetch the contents of a URL").with_parameters(json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "URL to fetch" }
            },
            "required": ["url"]
        }))
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError> {
        let url = args
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("`url` must be a string".to_string()))?;
        let mut text = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?
            .text()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        if text.len() > FETCH_MAX_CHARS {
            let mut end = FETCH_MAX_CHARS;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            text.truncate(end);
        }
        Ok(ToolResult::success("web_fetch", json!({ "content": text })))
    }
}
