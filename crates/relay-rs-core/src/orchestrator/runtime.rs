//! The bounded round loop behind [`Orchestrator::run`](super::Orchestrator::run).

use super::OrchestratorConfig;
use super::dispatch::{self, ToolOutcome};
use super::progress;
use crate::accumulator::RoundState;
use crate::sessions::SessionStore;
use async_stream::stream;
use futures_util::{Stream, StreamExt};
use log::{debug, error, info, warn};
use relay_rs_protocol::{
    ChatCompletionChunk, FinishReason, Message, ModelClient, ModelRequest, ToolCall, ToolProvider,
};
use serde_json::{Value, json};
use std::sync::Arc;

/// Everything one orchestration call owns while it streams.
pub(crate) struct RoundLoop {
    pub(crate) session_id: String,
    pub(crate) model: Arc<dyn ModelClient>,
    pub(crate) tools: Arc<dyn ToolProvider>,
    pub(crate) sessions: SessionStore,
    pub(crate) config: Arc<OrchestratorConfig>,
    pub(crate) model_name: String,
    pub(crate) temperature: f32,
    pub(crate) max_tokens: Option<u32>,
    pub(crate) tool_definitions: Option<Vec<Value>>,
    pub(crate) tool_choice: Option<Value>,
    /// Running message list sent to the model each round.
    pub(crate) messages: Vec<Message>,
}

/// How a streamed round ended.
enum RoundEnd {
    /// The model asked for tools; state holds the drafts.
    ToolCalls(RoundState),
    /// Stream finished with any other outcome.
    Finished(RoundState),
    /// Transport failure; the error chunk was already emitted.
    Failed,
}

impl RoundLoop {
    /// Drive the rounds lazily. Dropping the stream stops the loop at its
    /// current suspension point; a round abandoned mid-stream never reaches
    /// tool execution, and a tool round abandoned before its last call
    /// finishes leaves no trace in the session.
    pub(crate) fn into_stream(self) -> impl Stream<Item = ChatCompletionChunk> + Send + 'static {
        let mut run = self;
        stream! {
            let max_rounds = run.config.max_rounds;
            for round in 1..=max_rounds {
                info!(
                    "starting round (session_id={}, round={}/{})",
                    run.session_id, round, max_rounds
                );

                let mut state = RoundState::new();
                let mut fragments = match run.model.stream_chat(run.model_request()).await {
                    Ok(fragments) => fragments,
                    Err(err) => {
                        error!("model request failed (session_id={}, error={})", run.session_id, err);
                        yield ChatCompletionChunk::error(format!("Error: {err}"));
                        return;
                    }
                };

                let end = loop {
                    let next = match tokio::time::timeout(run.config.fragment_timeout, fragments.next()).await {
                        Ok(next) => next,
                        Err(_) => {
                            error!(
                                "model stream stalled (session_id={}, timeout_secs={})",
                                run.session_id,
                                run.config.fragment_timeout.as_secs_f64()
                            );
                            yield ChatCompletionChunk::error("Error: model stream timed out");
                            break RoundEnd::Failed;
                        }
                    };
                    match next {
                        Some(Ok(fragment)) => {
                            state.apply(&fragment);
                            yield ChatCompletionChunk::from_fragment(&fragment);
                            if state.finish_reason() == Some(&FinishReason::ToolCalls) {
                                break RoundEnd::ToolCalls(state);
                            }
                        }
                        Some(Err(err)) => {
                            error!("model stream failed (session_id={}, error={})", run.session_id, err);
                            yield ChatCompletionChunk::error(format!("Error: {err}"));
                            break RoundEnd::Failed;
                        }
                        None => break RoundEnd::Finished(state),
                    }
                };
                drop(fragments);

                let state = match end {
                    RoundEnd::Failed => return,
                    RoundEnd::Finished(state) => {
                        run.finish_without_tools(state);
                        return;
                    }
                    RoundEnd::ToolCalls(state) if !state.is_tool_call_terminal() => {
                        run.finish_without_tools(state);
                        return;
                    }
                    RoundEnd::ToolCalls(state) => state,
                };

                let (content, drafts) = state.into_parts();
                let calls: Vec<ToolCall> = drafts.iter().map(|draft| draft.to_tool_call()).collect();
                let content = (!content.is_empty()).then_some(content);
                // The round reaches the session only once every call is answered.
                let round_start = run.messages.len();
                run.messages.push(Message::assistant(content, calls));
                let mut records = Vec::with_capacity(drafts.len());

                let announce = run.config.announce_tools;
                if announce {
                    yield ChatCompletionChunk::notice(progress::round_started(drafts.len()));
                }
                for (position, draft) in drafts.iter().enumerate() {
                    let arguments = dispatch::resolve_arguments(draft);
                    if announce {
                        yield ChatCompletionChunk::notice(progress::call_summary(position, draft, &arguments));
                        if !draft.name.is_empty() {
                            yield ChatCompletionChunk::notice(progress::call_running(&draft.name));
                        }
                    }
                    let ToolOutcome { record, message } = dispatch::execute_call(
                        run.tools.as_ref(),
                        draft,
                        arguments,
                        run.config.tool_timeout,
                    )
                    .await;
                    if announce {
                        yield ChatCompletionChunk::notice(progress::call_finished(&record));
                    }
                    run.messages.push(message);
                    records.push(record);
                }
                debug_assert!(records.iter().all(|record| record.is_terminal()));
                run.commit_from(round_start);
                if announce {
                    yield ChatCompletionChunk::notice(progress::round_finished());
                }

                if round == max_rounds {
                    warn!(
                        "round limit reached with pending tool results (session_id={}, max_rounds={})",
                        run.session_id, max_rounds
                    );
                    break;
                }
                let continuation = Message::user(run.config.continuation_prompt.clone());
                run.push(continuation);
            }
        }
    }

    fn model_request(&self) -> ModelRequest {
        let tool_choice = self
            .tool_definitions
            .as_ref()
            .map(|_| self.tool_choice.clone().unwrap_or_else(|| json!("auto")));
        ModelRequest {
            model: self.model_name.clone(),
            messages: self.messages.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: self.tool_definitions.clone(),
            tool_choice,
        }
    }

    /// Append to the running list and record in the session.
    fn push(&mut self, message: Message) {
        self.record(message.clone());
        self.messages.push(message);
    }

    /// Record every running-list message from `start` on.
    fn commit_from(&self, start: usize) {
        for message in &self.messages[start..] {
            self.record(message.clone());
        }
    }

    fn record(&self, message: Message) {
        if !self.sessions.append_message(&self.session_id, message) {
            warn!(
                "session no longer live; message not recorded (session_id={})",
                self.session_id
            );
        }
    }

    /// Close a round that did not end in tool calls.
    fn finish_without_tools(&self, state: RoundState) {
        if !state.drafts().is_empty() {
            warn!(
                "round ended without tool_calls finish; skipping {} draft(s) (session_id={}, finish_reason={:?})",
                state.drafts().len(),
                self.session_id,
                state.finish_reason().map(FinishReason::as_str)
            );
        }
        let (content, _) = state.into_parts();
        if !content.is_empty() {
            self.record(Message::assistant(Some(content), Vec::new()));
        }
        debug!("orchestration finished (session_id={})", self.session_id);
    }
}
