//! Tool backends and qualified-name routing for Relay.

pub mod backend;
pub mod hub;
pub mod mcp;

/// Tool backend trait.
pub use backend::ToolBackend;
/// Backend registry implementing `ToolProvider`.
pub use hub::ToolHub;
/// MCP stdio backend and startup helper.
pub use mcp::{McpBackend, map_call_result, register_mcp_servers};
