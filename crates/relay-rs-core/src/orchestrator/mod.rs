//! Streaming tool-call orchestration.

mod dispatch;
mod progress;
pub(crate) mod prompt;
mod runtime;

use crate::error::RelayCoreError;
use crate::sessions::SessionStore;
use futures_util::Stream;
use log::{debug, info};
use relay_rs_config::RelayConfig;
use relay_rs_protocol::{ChatCompletionChunk, ChatRequest, Message, ModelClient, Role, ToolProvider};
use runtime::RoundLoop;
use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

/// Settings for the round loop.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Model used when a request does not name one.
    pub default_model: String,
    pub max_rounds: usize,
    pub tool_timeout: Duration,
    /// Maximum wait for the next model fragment.
    pub fragment_timeout: Duration,
    pub announce_tools: bool,
    pub inject_system_prompt: bool,
    /// User message appended after each tool round.
    pub continuation_prompt: String,
}

impl OrchestratorConfig {
    pub fn from_config(config: &RelayConfig) -> Self {
        let orchestration = &config.orchestration;
        Self {
            default_model: config.llm.model.clone(),
            max_rounds: orchestration.max_rounds.max(1),
            tool_timeout: Duration::from_secs(orchestration.tool_timeout_secs),
            fragment_timeout: Duration::from_secs(orchestration.fragment_timeout_secs),
            announce_tools: orchestration.announce_tools,
            inject_system_prompt: orchestration.inject_system_prompt,
            continuation_prompt: orchestration.continuation_prompt.clone(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_config(&RelayConfig::default())
    }
}

/// Lazily produced chunks for one orchestration call.
///
/// Nothing runs until the stream is polled; dropping it abandons the call.
pub struct RunStream {
    /// Session the call belongs to.
    pub session_id: String,
    chunks: Pin<Box<dyn Stream<Item = ChatCompletionChunk> + Send>>,
}

impl Stream for RunStream {
    type Item = ChatCompletionChunk;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().chunks.as_mut().poll_next(cx)
    }
}

/// Entry point of the engine: model and tool collaborators are injected at
/// construction, sessions are shared with the rest of the gateway.
#[derive(Clone)]
pub struct Orchestrator {
    model: Arc<dyn ModelClient>,
    tools: Arc<dyn ToolProvider>,
    sessions: SessionStore,
    config: Arc<OrchestratorConfig>,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn ModelClient>,
        tools: Arc<dyn ToolProvider>,
        sessions: SessionStore,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            model,
            tools,
            sessions,
            config: Arc::new(config),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Start an orchestration call for a live session.
    ///
    /// Fails without producing a stream when the session is unknown or the
    /// inbound messages contain an unanswerable tool message. Every later
    /// failure is reported in-band as a terminal error chunk.
    pub async fn run(
        &self,
        session_id: &str,
        request: ChatRequest,
    ) -> Result<RunStream, RelayCoreError> {
        if self.sessions.get(session_id).is_none() {
            return Err(RelayCoreError::UnknownSession(session_id.to_string()));
        }
        validate_tool_linkage(&request.messages)?;

        let catalog = self.tools.list_tools().await?;
        let prepared = prompt::prepare_request(&request, &catalog, &self.config);
        for message in new_inbound_messages(&request.messages) {
            self.sessions.append_message(session_id, message.clone());
        }

        let model_name = request
            .model
            .clone()
            .filter(|model| !model.is_empty())
            .unwrap_or_else(|| self.config.default_model.clone());
        info!(
            "starting orchestration (session_id={}, model={}, messages={}, tools={})",
            session_id,
            model_name,
            prepared.messages.len(),
            prepared.tools.as_ref().map(Vec::len).unwrap_or(0)
        );

        let run = RoundLoop {
            session_id: session_id.to_string(),
            model: self.model.clone(),
            tools: self.tools.clone(),
            sessions: self.sessions.clone(),
            config: self.config.clone(),
            model_name,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            tool_definitions: prepared.tools,
            tool_choice: request.tool_choice,
            messages: prepared.messages,
        };
        Ok(RunStream {
            session_id: session_id.to_string(),
            chunks: Box::pin(run.into_stream()),
        })
    }
}

/// Every tool message must answer a call issued by an earlier assistant message.
fn validate_tool_linkage(messages: &[Message]) -> Result<(), RelayCoreError> {
    let mut issued: HashSet<&str> = HashSet::new();
    for (position, message) in messages.iter().enumerate() {
        match message.role {
            Role::Assistant => {
                issued.extend(
                    message
                        .tool_calls
                        .iter()
                        .flatten()
                        .map(|call| call.id.as_str()),
                );
            }
            Role::Tool => match message.tool_call_id.as_deref() {
                Some(id) if issued.contains(id) => {}
                Some(id) => {
                    return Err(RelayCoreError::InvalidToolLinkage(format!(
                        "message {position} answers unknown tool call `{id}`"
                    )));
                }
                None => {
                    return Err(RelayCoreError::InvalidToolLinkage(format!(
                        "tool message {position} has no tool_call_id"
                    )));
                }
            },
            Role::User | Role::System => {}
        }
    }
    Ok(())
}

/// Messages the caller added since the last assistant turn.
fn new_inbound_messages(messages: &[Message]) -> &[Message] {
    let start = messages
        .iter()
        .rposition(|message| message.role == Role::Assistant)
        .map(|position| position + 1)
        .unwrap_or(0);
    debug!("recording inbound messages (count={})", messages.len() - start);
    &messages[start..]
}
