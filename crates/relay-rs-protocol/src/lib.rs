//! Wire types shared by the relay gateway: chat messages, streamed model
//! fragments, outbound completion chunks, and the collaborator traits the
//! orchestration engine is built against.

mod model;
mod tool;

pub use model::{FragmentStream, ModelClient, ModelError, ModelRequest};
pub use tool::{ContentItem, ToolError, ToolOutput, ToolProvider, ToolSpec};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Object tag carried by every outbound streaming chunk.
pub const CHUNK_OBJECT: &str = "chat.completion.chunk";
/// Tool call type used by OpenAI-style function calling.
pub const FUNCTION_CALL_TYPE: &str = "function";

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl Role {
    /// Return the wire representation of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
        }
    }
}

/// One chat message in OpenAI shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author of the message.
    pub role: Role,
    /// Text content, absent for pure tool-call assistant turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Calls requested by an assistant message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Call answered by a tool message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Optional participant or tool name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn with_role(role: Role, content: Option<String>) -> Self {
        Self {
            role,
            content,
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, Some(content.into()))
    }

    /// Build a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, Some(content.into()))
    }

    /// Build an assistant message, optionally carrying tool calls.
    pub fn assistant(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        let mut message = Self::with_role(Role::Assistant, content);
        if !tool_calls.is_empty() {
            message.tool_calls = Some(tool_calls);
        }
        message
    }

    /// Build a tool message answering `tool_call_id`.
    pub fn tool(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut message = Self::with_role(Role::Tool, Some(content.into()));
        message.tool_call_id = Some(tool_call_id.into());
        let name = name.into();
        if !name.is_empty() {
            message.name = Some(name);
        }
        message
    }

    /// Content length in bytes, zero when absent.
    pub fn content_len(&self) -> usize {
        self.content.as_deref().map(str::len).unwrap_or(0)
    }
}

/// A complete tool call attached to an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "default_call_type")]
    pub kind: String,
    pub function: FunctionCall,
}

/// Function name plus its raw JSON argument string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

fn default_call_type() -> String {
    FUNCTION_CALL_TYPE.to_string()
}

/// Why a model stream (or one round of it) ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
    Error,
    /// Provider-specific reason passed through verbatim.
    Other(String),
}

impl FinishReason {
    pub fn as_str(&self) -> &str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::ToolCalls => "tool_calls",
            FinishReason::Length => "length",
            FinishReason::ContentFilter => "content_filter",
            FinishReason::Error => "error",
            FinishReason::Other(other) => other,
        }
    }
}

impl From<String> for FinishReason {
    fn from(value: String) -> Self {
        match value.as_str() {
            "stop" => FinishReason::Stop,
            "tool_calls" => FinishReason::ToolCalls,
            "length" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            "error" => FinishReason::Error,
            _ => FinishReason::Other(value),
        }
    }
}

impl From<FinishReason> for String {
    fn from(value: FinishReason) -> Self {
        match value {
            FinishReason::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

/// Partial tool call carried by a single stream fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    /// Position of the call within the assistant turn.
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionDelta>,
}

/// Partial function name and argument chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// One incremental unit of a streamed model response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamFragment {
    /// Provider chunk id, forwarded to outbound chunks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Model that produced the chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Unix timestamp of the chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    /// Incremental text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Partial tool calls.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallDelta>,
    /// Terminal reason, set at most once per stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl StreamFragment {
    /// Fragment carrying only text.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// Fragment carrying only a finish reason.
    pub fn finish(reason: FinishReason) -> Self {
        Self {
            finish_reason: Some(reason),
            ..Self::default()
        }
    }

    /// Fragment carrying one partial tool call.
    pub fn tool_call(
        index: usize,
        id: Option<&str>,
        name: Option<&str>,
        arguments: Option<&str>,
    ) -> Self {
        Self {
            tool_calls: vec![ToolCallDelta {
                index,
                id: id.map(str::to_string),
                kind: id.map(|_| FUNCTION_CALL_TYPE.to_string()),
                function: Some(FunctionDelta {
                    name: name.map(str::to_string),
                    arguments: arguments.map(str::to_string),
                }),
            }],
            ..Self::default()
        }
    }

    /// Attach a finish reason to this fragment.
    pub fn with_finish(mut self, reason: FinishReason) -> Self {
        self.finish_reason = Some(reason);
        self
    }
}

/// Inbound chat request, as accepted by the HTTP surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Conversation the request belongs to; generated when absent.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Target model; the configured default is used when absent.
    #[serde(default)]
    pub model: Option<String>,
    pub messages: Vec<Message>,
    #[serde(default = "default_stream")]
    pub stream: bool,
    /// OpenAI function definitions supplied by the caller.
    #[serde(default)]
    pub tools: Option<Vec<Value>>,
    #[serde(default)]
    pub tool_choice: Option<Value>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_stream() -> bool {
    true
}

fn default_temperature() -> f32 {
    0.7
}

impl ChatRequest {
    /// Request with default sampling settings.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            session_id: None,
            model: None,
            messages,
            stream: true,
            tools: None,
            tool_choice: None,
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

/// Outbound streaming chunk, one per emitted fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub object: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

impl ChatCompletionChunk {
    fn single(delta: ChunkDelta, finish_reason: Option<FinishReason>) -> Self {
        Self {
            id: None,
            object: CHUNK_OBJECT.to_string(),
            created: None,
            model: None,
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
        }
    }

    /// Re-emit a model fragment unchanged.
    pub fn from_fragment(fragment: &StreamFragment) -> Self {
        let tool_calls = if fragment.tool_calls.is_empty() {
            None
        } else {
            Some(fragment.tool_calls.clone())
        };
        let mut chunk = Self::single(
            ChunkDelta {
                content: fragment.content.clone(),
                tool_calls,
            },
            fragment.finish_reason.clone(),
        );
        chunk.id = fragment.id.clone();
        chunk.created = fragment.created;
        chunk.model = fragment.model.clone();
        chunk
    }

    /// Content-only chunk synthesized by the gateway.
    pub fn notice(content: impl Into<String>) -> Self {
        Self::single(
            ChunkDelta {
                content: Some(content.into()),
                tool_calls: None,
            },
            None,
        )
    }

    /// Terminal error chunk.
    pub fn error(message: impl Into<String>) -> Self {
        Self::single(
            ChunkDelta {
                content: Some(message.into()),
                tool_calls: None,
            },
            Some(FinishReason::Error),
        )
    }

    /// Text of the first choice, if any.
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
    }

    /// Finish reason of the first choice, if any.
    pub fn finish_reason(&self) -> Option<&FinishReason> {
        self.choices
            .first()
            .and_then(|choice| choice.finish_reason.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn role_serializes_as_wire_name() {
        for role in [Role::User, Role::Assistant, Role::System, Role::Tool] {
            assert_eq!(serde_json::to_value(role).expect("ser"), json!(role.as_str()));
        }
        assert!(serde_json::from_value::<Role>(json!("developer")).is_err());
    }

    #[test]
    fn unknown_finish_reason_is_preserved() {
        let reason: FinishReason = serde_json::from_value(json!("function_call")).expect("parse");
        assert_eq!(reason, FinishReason::Other("function_call".to_string()));
        assert_eq!(serde_json::to_value(&reason).expect("ser"), json!("function_call"));
        let reason: FinishReason = serde_json::from_value(json!("tool_calls")).expect("parse");
        assert_eq!(reason, FinishReason::ToolCalls);
    }

    #[test]
    fn chat_request_applies_defaults() {
        let request: ChatRequest = serde_json::from_value(json!({
            "messages": [{"role": "user", "content": "what's 2+2"}],
            "tools": []
        }))
        .expect("request");
        assert_eq!(request.session_id, None);
        assert_eq!(request.stream, true);
        assert_eq!(request.temperature, 0.7);
        assert_eq!(request.tools, Some(Vec::new()));
        assert_eq!(request.messages, vec![Message::user("what's 2+2")]);
    }

    #[test]
    fn tool_message_serializes_linkage() {
        let message = Message::tool("call_1", "fs_read", "{\"ok\":true}");
        assert_eq!(
            serde_json::to_value(&message).expect("ser"),
            json!({
                "role": "tool",
                "content": "{\"ok\":true}",
                "tool_call_id": "call_1",
                "name": "fs_read"
            })
        );
    }

    #[test]
    fn chunk_from_fragment_keeps_null_finish_reason() {
        let chunk = ChatCompletionChunk::from_fragment(&StreamFragment::text("4"));
        assert_eq!(
            serde_json::to_value(&chunk).expect("ser"),
            json!({
                "object": "chat.completion.chunk",
                "choices": [{"index": 0, "delta": {"content": "4"}, "finish_reason": null}]
            })
        );
    }

    #[test]
    fn chunk_forwards_tool_call_deltas() {
        let fragment = StreamFragment::tool_call(1, Some("call_b"), Some("calc_add"), Some("{"))
            .with_finish(FinishReason::ToolCalls);
        let value = serde_json::to_value(ChatCompletionChunk::from_fragment(&fragment)).expect("ser");
        assert_eq!(
            value["choices"][0]["delta"]["tool_calls"],
            json!([{
                "index": 1,
                "id": "call_b",
                "type": "function",
                "function": {"name": "calc_add", "arguments": "{"}
            }])
        );
        assert_eq!(value["choices"][0]["finish_reason"], json!("tool_calls"));
    }

    #[test]
    fn error_chunk_is_terminal() {
        let chunk = ChatCompletionChunk::error("model stream failed");
        assert_eq!(chunk.finish_reason(), Some(&FinishReason::Error));
        assert_eq!(chunk.content(), Some("model stream failed"));
    }
}
