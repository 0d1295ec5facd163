//! Error types for the core engine.

use relay_rs_protocol::ToolError;
use thiserror::Error;

/// Errors that reject an orchestration call before any chunk is streamed.
///
/// Failures after streaming has started are reported in-band as a terminal
/// error chunk instead.
#[derive(Debug, Error)]
pub enum RelayCoreError {
    /// Session id is unknown, expired, or evicted.
    #[error("unknown session: {0}")]
    UnknownSession(String),
    /// A tool message does not answer a previously issued call.
    #[error("invalid tool message linkage: {0}")]
    InvalidToolLinkage(String),
    /// The tool catalog could not be listed.
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),
}
