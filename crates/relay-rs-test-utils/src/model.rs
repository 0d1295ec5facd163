use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use parking_lot::Mutex;
use relay_rs_protocol::{
    FinishReason, FragmentStream, ModelClient, ModelError, ModelRequest, StreamFragment,
};
use std::collections::VecDeque;
use std::sync::Arc;

/// Replays one scripted fragment list per model call and records every request.
///
/// Calls beyond the script get an empty stream.
#[derive(Debug, Clone, Default)]
pub struct ScriptedModel {
    rounds: Arc<Mutex<VecDeque<Vec<StreamFragment>>>>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
}

impl ScriptedModel {
    pub fn new(rounds: Vec<Vec<StreamFragment>>) -> Self {
        Self {
            rounds: Arc::new(Mutex::new(rounds.into())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Single round streaming `chunks` as text, then `stop`.
    pub fn text(chunks: &[&str]) -> Self {
        let mut fragments: Vec<StreamFragment> =
            chunks.iter().map(|chunk| StreamFragment::text(*chunk)).collect();
        fragments.push(StreamFragment::finish(FinishReason::Stop));
        Self::new(vec![fragments])
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn stream_chat(&self, request: ModelRequest) -> Result<FragmentStream, ModelError> {
        self.requests.lock().push(request);
        let fragments = self.rounds.lock().pop_front().unwrap_or_default();
        Ok(Box::pin(stream::iter(fragments.into_iter().map(Ok))))
    }
}

/// Requests the same tool on every call, forever.
#[derive(Debug, Clone)]
pub struct LoopingToolCallModel {
    tool: String,
    arguments: String,
    calls: Arc<Mutex<usize>>,
}

impl LoopingToolCallModel {
    pub fn new(tool: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            arguments: arguments.into(),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl ModelClient for LoopingToolCallModel {
    async fn stream_chat(&self, _request: ModelRequest) -> Result<FragmentStream, ModelError> {
        let round = {
            let mut calls = self.calls.lock();
            *calls += 1;
            *calls
        };
        let id = format!("call_loop_{round}");
        let fragments = vec![
            StreamFragment::tool_call(0, Some(&id), Some(&self.tool), Some(&self.arguments)),
            StreamFragment::finish(FinishReason::ToolCalls),
        ];
        Ok(Box::pin(stream::iter(fragments.into_iter().map(Ok))))
    }
}

/// Fails either when the stream is opened or after a few fragments.
#[derive(Debug, Clone)]
pub struct FailingModel {
    message: String,
    before_failure: Option<Vec<StreamFragment>>,
}

impl FailingModel {
    /// `stream_chat` itself returns an error.
    pub fn on_open(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            before_failure: None,
        }
    }

    /// The stream yields `fragments`, then an error item.
    pub fn mid_stream(fragments: Vec<StreamFragment>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            before_failure: Some(fragments),
        }
    }
}

#[async_trait]
impl ModelClient for FailingModel {
    async fn stream_chat(&self, _request: ModelRequest) -> Result<FragmentStream, ModelError> {
        let Some(fragments) = self.before_failure.clone() else {
            return Err(ModelError::Transport(self.message.clone()));
        };
        let failure = ModelError::Transport(self.message.clone());
        let items = fragments
            .into_iter()
            .map(Ok)
            .chain(std::iter::once(Err(failure)));
        Ok(Box::pin(stream::iter(items)))
    }
}

/// Yields its fragments, then never produces another item.
#[derive(Debug, Clone)]
pub struct StallingModel {
    fragments: Vec<StreamFragment>,
}

impl StallingModel {
    pub fn new(fragments: Vec<StreamFragment>) -> Self {
        Self { fragments }
    }
}

#[async_trait]
impl ModelClient for StallingModel {
    async fn stream_chat(&self, _request: ModelRequest) -> Result<FragmentStream, ModelError> {
        let head = stream::iter(self.fragments.clone().into_iter().map(Ok));
        Ok(Box::pin(head.chain(stream::pending())))
    }
}
