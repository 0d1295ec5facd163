//! Model clients for Relay.

pub mod openai;
mod sse;

/// OpenAI-compatible streaming chat client.
pub use openai::OpenAiClient;
