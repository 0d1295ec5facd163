//! Tool backend trait.

use async_trait::async_trait;
use relay_rs_protocol::{ToolError, ToolOutput, ToolSpec};
use serde_json::{Map, Value};
use std::fmt::Debug;

/// A source of tools registered with the [`ToolHub`](crate::ToolHub) under a
/// unique id.
#[async_trait]
pub trait ToolBackend: Send + Sync + Debug {
    /// Backend id, used as the qualified-name prefix.
    fn id(&self) -> &str;

    /// Catalog with unprefixed tool names.
    fn tools(&self) -> Vec<ToolSpec>;

    /// Invoke a tool by its unprefixed name.
    async fn call(&self, name: &str, arguments: Map<String, Value>)
    -> Result<ToolOutput, ToolError>;

    /// Release backend resources. Called once by the hub on shutdown.
    async fn shutdown(&self) {}

    /// Whether the catalog lists `name`.
    fn has_tool(&self, name: &str) -> bool {
        self.tools().iter().any(|tool| tool.name == name)
    }
}
