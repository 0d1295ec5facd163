//! Tool collaborator contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Catalog entry for a callable tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Qualified name used when calling the tool.
    pub name: String,
    pub description: String,
    /// JSON schema for the arguments object.
    pub parameters: Value,
}

impl ToolSpec {
    /// Render as an OpenAI function definition.
    pub fn to_function_definition(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// One typed item of a tool result.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentItem {
    Text(String),
    Image { mime_type: String },
    /// Any other item kind, kept as its raw JSON form.
    Opaque { kind: String, value: Value },
}

/// Raw result returned by a tool collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text(String),
    Structured(Value),
    Content(Vec<ContentItem>),
}

/// Resolves qualified tool names and executes calls.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Current tool catalog with qualified names.
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolError>;

    /// Invoke `qualified_name` with structured arguments.
    async fn call(
        &self,
        qualified_name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolOutput, ToolError>;
}

/// Errors returned by tools and tool backends.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Tool name was not found in any backend.
    #[error("tool not found: {0}")]
    ToolNotFound(String),
    /// Backend id is not registered.
    #[error("backend not found: {0}")]
    BackendNotFound(String),
    /// Tool received invalid arguments.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    /// Tool execution failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    /// Tool did not answer in time.
    #[error("timed out: {0}")]
    Timeout(String),
}
