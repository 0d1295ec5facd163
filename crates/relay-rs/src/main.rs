use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{debug, info};
use relay_rs::config::{McpServerConfig, RelayConfig};
use relay_rs::core::{Orchestrator, OrchestratorConfig, Reaper, SessionSettings, SessionStore};
use relay_rs::provider::OpenAiClient;
use relay_rs::server::{AppState, build_rocket};
use relay_rs::tools::{ToolHub, register_mcp_servers};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "relay", version, about = "Streaming chat gateway with MCP tool calling")]
struct Cli {
    /// Path to a relay.json5 config file; skips layered discovery
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the bind address
    #[arg(long)]
    host: Option<String>,
    /// Override the bind port
    #[arg(long)]
    port: Option<u16>,
    /// Upstream API key; takes precedence over the config file
    #[arg(long, env = "RELAY_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;
    relay_rs::init_logging(&config.logging.level);

    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(key) = cli.api_key.or_else(|| std::env::var("OPENAI_API_KEY").ok()) {
        if config.llm.api_key.as_deref().is_none_or(str::is_empty) {
            config.llm.api_key = Some(key);
        }
    }

    let model = OpenAiClient::from_config(&config.llm).context("failed to build model client")?;
    info!(
        "upstream model configured (endpoint={}, model={})",
        model.endpoint(),
        config.llm.model
    );

    let orchestrator_config = OrchestratorConfig::from_config(&config);
    let hub = ToolHub::new();
    let servers: Vec<McpServerConfig> = config.enabled_mcp_servers().cloned().collect();
    let registered = register_mcp_servers(&hub, &servers, orchestrator_config.tool_timeout).await;
    info!(
        "tool backends ready (registered={}, configured={})",
        registered,
        servers.len()
    );

    let sessions = SessionStore::new(SessionSettings::from_config(&config.session));
    let reaper = Arc::new(Reaper::new(
        sessions.clone(),
        Duration::from_secs(config.session.cleanup_interval_secs),
    ));
    reaper.start();

    let orchestrator = Orchestrator::new(
        Arc::new(model),
        Arc::new(hub.clone()),
        sessions,
        orchestrator_config,
    );
    let state = AppState::new(orchestrator, reaper.clone());

    info!(
        "starting relay server (host={}, port={})",
        config.server.host, config.server.port
    );
    let outcome = build_rocket(state, &config.server).launch().await;

    reaper.shutdown().await;
    hub.shutdown().await;
    outcome.map_err(|err| anyhow!("server failed: {err}"))?;
    info!("relay server stopped");
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<RelayConfig> {
    if let Some(path) = path {
        return RelayConfig::load_from_path(path).context("failed to load config");
    }
    let cwd = std::env::current_dir().context("failed to resolve working directory")?;
    let layered = RelayConfig::load_layered(&cwd).context("failed to load layered config")?;
    for layer in &layered.layers {
        debug!(
            "config layer loaded (source={:?}, path={})",
            layer.source,
            layer.path.display()
        );
    }
    Ok(layered.config)
}
