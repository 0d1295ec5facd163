//! Model collaborator contract.

use crate::{Message, StreamFragment};
use async_trait::async_trait;
use futures_util::Stream;
use serde_json::Value;
use std::pin::Pin;

/// Ordered stream of fragments for one model call.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<StreamFragment, ModelError>> + Send>>;

/// Parameters for a single streaming chat call.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// OpenAI function definitions; `None` when no tools are offered.
    pub tools: Option<Vec<Value>>,
    pub tool_choice: Option<Value>,
}

/// Streams chat completions from a language model.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Open a fragment stream. The stream ends naturally at provider stream end.
    async fn stream_chat(&self, request: ModelRequest) -> Result<FragmentStream, ModelError>;
}

/// Errors raised by model collaborators.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Connection or body read failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// Provider answered with a non-success status.
    #[error("provider returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },
    /// A streamed event could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),
    /// No fragment arrived within the allowed time.
    #[error("timed out: {0}")]
    Timeout(String),
}
