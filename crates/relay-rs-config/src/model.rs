//! Configuration schema for the relay gateway.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root config for the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RelayConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub orchestration: OrchestrationConfig,
    #[serde(default)]
    pub mcp_servers: Vec<McpServerConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RelayConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> RelayConfigBuilder {
        RelayConfigBuilder::new()
    }

    /// MCP servers that are switched on.
    pub fn enabled_mcp_servers(&self) -> impl Iterator<Item = &McpServerConfig> {
        self.mcp_servers.iter().filter(|server| server.enabled)
    }
}

/// Builder for assembling a `RelayConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct RelayConfigBuilder {
    config: RelayConfig,
}

impl RelayConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: RelayConfig::default(),
        }
    }

    pub fn server(mut self, server: ServerConfig) -> Self {
        self.config.server = server;
        self
    }

    pub fn llm(mut self, llm: LlmConfig) -> Self {
        self.config.llm = llm;
        self
    }

    pub fn session(mut self, session: SessionConfig) -> Self {
        self.config.session = session;
        self
    }

    pub fn orchestration(mut self, orchestration: OrchestrationConfig) -> Self {
        self.config.orchestration = orchestration;
        self
    }

    /// Append one MCP server definition.
    pub fn mcp_server(mut self, server: McpServerConfig) -> Self {
        self.config.mcp_servers.push(server);
        self
    }

    /// Finalize and return the built `RelayConfig`.
    pub fn build(self) -> RelayConfig {
        self.config
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Upstream OpenAI-compatible model endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model used when a request does not name one.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    300
}

/// Session registry limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Idle time after which a session expires.
    #[serde(default = "default_session_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum number of concurrently active sessions.
    #[serde(default = "default_max_active")]
    pub max_active: usize,
    /// Period of the background reaper.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_session_timeout_secs(),
            max_active: default_max_active(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

fn default_session_timeout_secs() -> u64 {
    3600
}

fn default_max_active() -> usize {
    100
}

fn default_cleanup_interval_secs() -> u64 {
    300
}

/// Tool-call round loop settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrchestrationConfig {
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    /// Maximum wait for the next model fragment.
    #[serde(default = "default_fragment_timeout_secs")]
    pub fragment_timeout_secs: u64,
    /// Emit progress notices while tools run.
    #[serde(default = "default_true")]
    pub announce_tools: bool,
    /// Prepend a system prompt listing the tool catalog.
    #[serde(default = "default_true")]
    pub inject_system_prompt: bool,
    #[serde(default = "default_continuation_prompt")]
    pub continuation_prompt: String,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            tool_timeout_secs: default_tool_timeout_secs(),
            fragment_timeout_secs: default_fragment_timeout_secs(),
            announce_tools: true,
            inject_system_prompt: true,
            continuation_prompt: default_continuation_prompt(),
        }
    }
}

fn default_max_rounds() -> usize {
    5
}

fn default_tool_timeout_secs() -> u64 {
    300
}

fn default_fragment_timeout_secs() -> u64 {
    300
}

fn default_continuation_prompt() -> String {
    "Please continue answering based on the tool results.".to_string()
}

fn default_true() -> bool {
    true
}

/// A stdio MCP server launched by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpServerConfig {
    /// Prefix for the server's qualified tool names.
    pub id: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
    #[serde(default = "default_list_timeout_secs")]
    pub list_timeout_secs: u64,
}

impl McpServerConfig {
    /// Server definition with default flags and timeouts.
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            enabled: true,
            startup_timeout_secs: default_startup_timeout_secs(),
            list_timeout_secs: default_list_timeout_secs(),
        }
    }
}

fn default_startup_timeout_secs() -> u64 {
    30
}

fn default_list_timeout_secs() -> u64 {
    10
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
