//! Conversions between agentd message types and genai chat types.

use genai::chat::{ChatMessage, ChatRequest, ContentPart, MessageContent, ToolResponse};

use crate::message::{Message, Role};
use crate::tool::{to_genai_tool, ProviderToolSpec};

/// Convert a message to a genai chat message.
pub fn to_chat_message(msg: &Message) -> ChatMessage {
    match msg.role {
        Role::System => ChatMessage::system(&msg.content),
        Role::User => ChatMessage::user(&msg.content),
        Role::Assistant => {
            if let Some(calls) = &msg.tool_calls {
                let mut content = MessageContent::from(msg.content.as_str());
                for call in calls {
                    content.push(ContentPart::ToolCall(genai::chat::ToolCall {
                        call_id: call.id.clone(),
                        fn_name: call.name.clone(),
                        fn_arguments: call.arguments.clone(),
                    }));
                }
                ChatMessage::assistant(content)
            } else {
                ChatMessage::assistant(&msg.content)
            }
        }
        Role::Tool => ChatMessage::from(ToolResponse {
            call_id: msg.tool_call_id.clone().unwrap_or_default(),
            content: msg.content.clone(),
        }),
    }
}

/// Build a chat request from the system message, history, and tool specs.
pub fn build_request(
    system_message: &str,
    messages: &[Message],
    tools: &[ProviderToolSpec],
) -> ChatRequest {
    let mut chat_messages = Vec::with_capacity(messages.len() + 1);
    if !system_message.is_empty() {
        chat_messages.push(ChatMessage::system(system_message));
    }
    chat_messages.extend(messages.iter().map(to_chat_message));

    let mut request = ChatRequest::new(chat_messages);
    if !tools.is_empty() {
        request = request.with_tools(tools.iter().map(to_genai_tool).collect::<Vec<_>>());
    }
    request
}
