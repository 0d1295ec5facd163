//! Stdio MCP servers as tool backends.

use crate::backend::ToolBackend;
use crate::hub::ToolHub;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use relay_rs_config::McpServerConfig;
use relay_rs_protocol::{ContentItem, ToolError, ToolOutput, ToolSpec};
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, PaginatedRequestParam, RawContent,
};
use rmcp::service::{Peer, RunningService};
use rmcp::transport::TokioChildProcess;
use rmcp::{RoleClient, ServiceExt};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

/// A running MCP server child process and its cached tool catalog.
pub struct McpBackend {
    id: String,
    peer: Peer<RoleClient>,
    service: Mutex<Option<RunningService<RoleClient, ()>>>,
    tools: Vec<ToolSpec>,
    call_timeout: Duration,
}

impl fmt::Debug for McpBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpBackend")
            .field("id", &self.id)
            .field("tools", &self.tools.len())
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl McpBackend {
    /// Spawn the server, complete the handshake and fetch its catalog.
    pub async fn connect(
        config: &McpServerConfig,
        call_timeout: Duration,
    ) -> Result<Self, ToolError> {
        info!(
            "starting MCP server (id={}, command={})",
            config.id, config.command
        );
        let mut command = Command::new(&config.command);
        command.args(&config.args).envs(&config.env);
        let transport = TokioChildProcess::new(command).map_err(|err| {
            ToolError::ExecutionFailed(format!(
                "failed to spawn MCP server `{}`: {err}",
                config.id
            ))
        })?;

        let startup = Duration::from_secs(config.startup_timeout_secs);
        let service = tokio::time::timeout(startup, ().serve(transport))
            .await
            .map_err(|_| {
                ToolError::Timeout(format!(
                    "MCP server `{}` handshake exceeded {}s",
                    config.id, config.startup_timeout_secs
                ))
            })?
            .map_err(|err| {
                ToolError::ExecutionFailed(format!(
                    "MCP server `{}` handshake failed: {err}",
                    config.id
                ))
            })?;

        let peer = service.peer().clone();
        let list_timeout = Duration::from_secs(config.list_timeout_secs);
        let tools = match list_all_tools(&peer, &config.id, list_timeout).await {
            Ok(tools) => tools,
            Err(err) => {
                if let Err(join) = service.cancel().await {
                    warn!("MCP server task failed to stop (id={}, error={})", config.id, join);
                }
                return Err(err);
            }
        };
        info!(
            "MCP server ready (id={}, tools={})",
            config.id,
            tools.len()
        );

        Ok(Self {
            id: config.id.clone(),
            peer,
            service: Mutex::new(Some(service)),
            tools,
            call_timeout,
        })
    }
}

#[async_trait]
impl ToolBackend for McpBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn tools(&self) -> Vec<ToolSpec> {
        self.tools.clone()
    }

    async fn call(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolOutput, ToolError> {
        debug!("calling MCP tool (backend={}, tool={})", self.id, name);
        let request = CallToolRequestParam {
            name: name.to_string().into(),
            arguments: Some(arguments),
        };
        let result = tokio::time::timeout(self.call_timeout, self.peer.call_tool(request))
            .await
            .map_err(|_| {
                ToolError::Timeout(format!(
                    "MCP tool `{}_{}` exceeded {}s",
                    self.id,
                    name,
                    self.call_timeout.as_secs()
                ))
            })?
            .map_err(|err| ToolError::ExecutionFailed(format!("MCP tools/call failed: {err}")))?;
        map_call_result(result)
    }

    async fn shutdown(&self) {
        let service = self.service.lock().take();
        if let Some(service) = service {
            match service.cancel().await {
                Ok(reason) => debug!("MCP server stopped (id={}, reason={:?})", self.id, reason),
                Err(err) => warn!("MCP server task failed to stop (id={}, error={})", self.id, err),
            }
        }
    }
}

async fn list_all_tools(
    peer: &Peer<RoleClient>,
    server_id: &str,
    page_timeout: Duration,
) -> Result<Vec<ToolSpec>, ToolError> {
    let mut tools = Vec::new();
    let mut cursor = None;
    loop {
        let page = tokio::time::timeout(
            page_timeout,
            peer.list_tools(Some(PaginatedRequestParam { cursor })),
        )
        .await
        .map_err(|_| {
            ToolError::Timeout(format!("MCP server `{server_id}` tools/list timed out"))
        })?
        .map_err(|err| {
            ToolError::ExecutionFailed(format!("MCP server `{server_id}` tools/list failed: {err}"))
        })?;

        tools.extend(page.tools.into_iter().map(|tool| ToolSpec {
            name: tool.name.to_string(),
            description: tool
                .description
                .map(|description| description.to_string())
                .unwrap_or_default(),
            parameters: Value::Object((*tool.input_schema).clone()),
        }));
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => return Ok(tools),
        }
    }
}

/// Translate an MCP call result. A result flagged `is_error` becomes
/// `ExecutionFailed` carrying the text it returned.
pub fn map_call_result(result: CallToolResult) -> Result<ToolOutput, ToolError> {
    let items: Vec<ContentItem> = result.content.into_iter().map(map_content).collect();

    if result.is_error.unwrap_or(false) {
        let message = items
            .iter()
            .filter_map(|item| match item {
                ContentItem::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        return Err(ToolError::ExecutionFailed(if message.is_empty() {
            "tool reported an error".to_string()
        } else {
            message
        }));
    }

    match (items.is_empty(), result.structured_content) {
        (true, Some(structured)) => Ok(ToolOutput::Structured(structured)),
        _ => Ok(ToolOutput::Content(items)),
    }
}

fn map_content(content: Content) -> ContentItem {
    match content.raw {
        RawContent::Text(text) => ContentItem::Text(text.text),
        RawContent::Image(image) => ContentItem::Image {
            mime_type: image.mime_type,
        },
        other => {
            let value = serde_json::to_value(&other).unwrap_or(Value::Null);
            let kind = value
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            ContentItem::Opaque { kind, value }
        }
    }
}

/// Start every server and register the ones that come up. Returns how many
/// were registered; failures are logged and skipped.
pub async fn register_mcp_servers(
    hub: &ToolHub,
    servers: &[McpServerConfig],
    call_timeout: Duration,
) -> usize {
    let mut registered = 0;
    for config in servers {
        match McpBackend::connect(config, call_timeout).await {
            Ok(backend) => {
                hub.register(Arc::new(backend));
                registered += 1;
            }
            Err(err) => error!("skipping MCP server (id={}, error={})", config.id, err),
        }
    }
    registered
}
