//! OpenAI-compatible `/chat/completions` streaming client.

use crate::sse::SseDecoder;
use async_stream::stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, error, warn};
use relay_rs_config::LlmConfig;
use relay_rs_protocol::{
    FinishReason, FragmentStream, Message, ModelClient, ModelError, ModelRequest, StreamFragment,
    ToolCallDelta,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";
const DONE_SENTINEL: &str = "[DONE]";
const ERROR_MESSAGE_MAX_CHARS: usize = 500;

/// Streams chat completions from an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ModelError::Transport(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.is_empty()),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ModelError> {
        Self::new(
            &config.base_url,
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, CHAT_COMPLETIONS_PATH)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [Value]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'a Value>,
}

impl<'a> From<&'a ModelRequest> for ChatCompletionBody<'a> {
    fn from(request: &'a ModelRequest) -> Self {
        Self {
            model: &request.model,
            messages: &request.messages,
            stream: true,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            tools: request.tools.as_deref(),
            tool_choice: request.tool_choice.as_ref(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireChunk {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    created: Option<i64>,
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    #[serde(default)]
    delta: WireDelta,
    #[serde(default)]
    finish_reason: Option<FinishReason>,
}

#[derive(Debug, Default, Deserialize)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// One decoded event: a fragment, the end sentinel, or a chunk with no choices.
#[derive(Debug, PartialEq)]
enum Payload {
    Fragment(StreamFragment),
    Done,
    Empty,
}

fn parse_payload(payload: &str) -> Result<Payload, ModelError> {
    let trimmed = payload.trim();
    if trimmed == DONE_SENTINEL {
        return Ok(Payload::Done);
    }
    if trimmed.is_empty() {
        return Ok(Payload::Empty);
    }
    let chunk: WireChunk = serde_json::from_str(trimmed)
        .map_err(|err| ModelError::Parse(format!("invalid stream chunk: {err}")))?;
    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(Payload::Empty);
    };
    Ok(Payload::Fragment(StreamFragment {
        id: chunk.id,
        model: chunk.model,
        created: chunk.created,
        content: choice.delta.content,
        tool_calls: choice.delta.tool_calls.unwrap_or_default(),
        finish_reason: choice.finish_reason,
    }))
}

/// Provider error text from a JSON error body, else the trimmed body.
fn extract_error_message(body: &str) -> String {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| body.trim().to_string());
    if message.is_empty() {
        return "empty error response from provider".to_string();
    }
    match message.char_indices().nth(ERROR_MESSAGE_MAX_CHARS) {
        Some((cut, _)) => format!("{}...", &message[..cut]),
        None => message,
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn stream_chat(&self, request: ModelRequest) -> Result<FragmentStream, ModelError> {
        debug!(
            "sending chat completion request (model={}, messages={}, tools={})",
            request.model,
            request.messages.len(),
            request.tools.as_ref().map(Vec::len).unwrap_or(0)
        );
        let mut builder = self
            .client
            .post(self.endpoint())
            .json(&ChatCompletionBody::from(&request));
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }
        let response = builder.send().await.map_err(|err| {
            if err.is_timeout() {
                ModelError::Timeout(err.to_string())
            } else {
                ModelError::Transport(err.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|err| format!("unable to read error body: {err}"));
            let message = extract_error_message(&body);
            error!(
                "chat completion request rejected (status={}, message={})",
                status.as_u16(),
                message
            );
            return Err(ModelError::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }

        let mut body = response.bytes_stream();
        Ok(Box::pin(stream! {
            let mut decoder = SseDecoder::default();
            while let Some(bytes) = body.next().await {
                let bytes = match bytes {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        yield Err(ModelError::Transport(format!("stream interrupted: {err}")));
                        return;
                    }
                };
                let payloads = match decoder.feed(&bytes) {
                    Ok(payloads) => payloads,
                    Err(message) => {
                        yield Err(ModelError::Parse(message));
                        return;
                    }
                };
                for payload in payloads {
                    match parse_payload(&payload) {
                        Ok(Payload::Fragment(fragment)) => yield Ok(fragment),
                        Ok(Payload::Empty) => {}
                        Ok(Payload::Done) => return,
                        Err(err) => {
                            yield Err(err);
                            return;
                        }
                    }
                }
            }

            let payloads = match decoder.finish() {
                Ok(payloads) => payloads,
                Err(message) => {
                    yield Err(ModelError::Parse(message));
                    return;
                }
            };
            for payload in payloads {
                match parse_payload(&payload) {
                    Ok(Payload::Fragment(fragment)) => yield Ok(fragment),
                    Ok(Payload::Empty) => {}
                    Ok(Payload::Done) => return,
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                }
            }
            warn!("chat completion stream ended without [DONE]");
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use relay_rs_protocol::FunctionDelta;
    use serde_json::json;

    #[test]
    fn payload_maps_first_choice() {
        let payload = json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-mini",
            "created": 1700000000,
            "choices": [{
                "index": 0,
                "delta": {"content": "Hel"},
                "finish_reason": null
            }]
        })
        .to_string();

        let Payload::Fragment(fragment) = parse_payload(&payload).expect("parse") else {
            panic!("expected fragment");
        };
        assert_eq!(fragment.id.as_deref(), Some("chatcmpl-1"));
        assert_eq!(fragment.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(fragment.created, Some(1700000000));
        assert_eq!(fragment.content.as_deref(), Some("Hel"));
        assert_eq!(fragment.finish_reason, None);
    }

    #[test]
    fn payload_carries_tool_call_deltas() {
        let payload = json!({
            "choices": [{
                "delta": {"tool_calls": [{
                    "index": 1,
                    "id": "call_9",
                    "type": "function",
                    "function": {"name": "web_search", "arguments": "{\"q\""}
                }]},
                "finish_reason": "tool_calls"
            }]
        })
        .to_string();

        let Payload::Fragment(fragment) = parse_payload(&payload).expect("parse") else {
            panic!("expected fragment");
        };
        assert_eq!(fragment.finish_reason, Some(FinishReason::ToolCalls));
        assert_eq!(
            fragment.tool_calls,
            vec![ToolCallDelta {
                index: 1,
                id: Some("call_9".to_string()),
                kind: Some("function".to_string()),
                function: Some(FunctionDelta {
                    name: Some("web_search".to_string()),
                    arguments: Some("{\"q\"".to_string()),
                }),
            }]
        );
    }

    #[test]
    fn sentinel_and_empty_choices_are_recognized() {
        assert_eq!(parse_payload(" [DONE] ").expect("parse"), Payload::Done);
        assert_eq!(
            parse_payload("{\"choices\":[],\"usage\":{\"total_tokens\":3}}").expect("parse"),
            Payload::Empty
        );
        assert!(matches!(parse_payload("{not json"), Err(ModelError::Parse(_))));
    }

    #[test]
    fn body_omits_absent_fields() {
        let request = ModelRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![Message::user("hi")],
            temperature: 0.5,
            max_tokens: None,
            tools: None,
            tool_choice: None,
        };

        let body = serde_json::to_value(ChatCompletionBody::from(&request)).expect("body");

        assert_eq!(
            body,
            json!({
                "model": "gpt-4o-mini",
                "messages": [{"role": "user", "content": "hi"}],
                "stream": true,
                "temperature": 0.5
            })
        );
    }

    #[test]
    fn error_message_prefers_provider_text() {
        assert_eq!(
            extract_error_message("{\"error\":{\"message\":\"Invalid API key\",\"type\":\"auth\"}}"),
            "Invalid API key"
        );
        assert_eq!(extract_error_message("  upstream down \n"), "upstream down");
        assert_eq!(extract_error_message(""), "empty error response from provider");
    }

    #[test]
    fn base_url_is_normalized() {
        let client =
            OpenAiClient::new(" http://localhost:9000/v1/ ", None, Duration::from_secs(5))
                .expect("client");
        assert_eq!(client.endpoint(), "http://localhost:9000/v1/chat/completions");
    }
}
