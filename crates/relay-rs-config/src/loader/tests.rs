//! Tests for config parsing and layered loading.

use super::*;
use crate::McpServerConfig;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Write JSON5 contents to a path, creating parent directories if needed.
fn write_json5(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("dir");
    }
    fs::write(path, contents).expect("write");
}

/// Options that never touch the real system or home directories.
fn isolated_options(root: &Path, cwd: &Path) -> LayeredConfigOptions {
    let mut options = LayeredConfigOptions::new(cwd);
    options.system_config_path = Some(root.join("system.json5"));
    options.user_config_path = Some(root.join("user.json5"));
    options
}

#[test]
fn parse_minimal_config() {
    let config = RelayConfig::load_from_str("{}").expect("config");
    assert_eq!(config, RelayConfig::default());
    assert_eq!(config.server.port, 8000);
    assert_eq!(config.session.timeout_secs, 3600);
    assert_eq!(config.session.max_active, 100);
    assert_eq!(config.session.cleanup_interval_secs, 300);
    assert_eq!(config.orchestration.max_rounds, 5);
    assert_eq!(config.orchestration.tool_timeout_secs, 300);
}

#[test]
fn parse_full_config_with_json5_syntax() {
    let json5 = r#"{
        // comments and trailing commas are allowed
        server: { host: "127.0.0.1", port: 9000 },
        llm: { base_url: "http://localhost:11434/v1", model: "llama3", api_key: null },
        session: { timeout_secs: 60, max_active: 2 },
        orchestration: { max_rounds: 3, announce_tools: false },
        mcp_servers: [
            { id: "fs", command: "npx", args: ["-y", "server-filesystem"], env: { DEBUG: "1" } },
            { id: "web", command: "web-mcp", enabled: false },
        ],
        logging: { level: "debug" },
    }"#;
    let config = RelayConfig::load_from_str(json5).expect("config");
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.llm.model, "llama3");
    assert_eq!(config.llm.api_key, None);
    assert_eq!(config.session.max_active, 2);
    assert_eq!(config.session.cleanup_interval_secs, 300);
    assert_eq!(config.orchestration.max_rounds, 3);
    assert_eq!(config.orchestration.announce_tools, false);
    assert_eq!(config.mcp_servers.len(), 2);
    assert_eq!(config.mcp_servers[0].args, vec!["-y", "server-filesystem"]);
    assert_eq!(config.mcp_servers[0].startup_timeout_secs, 30);
    let enabled: Vec<&str> = config
        .enabled_mcp_servers()
        .map(|server| server.id.as_str())
        .collect();
    assert_eq!(enabled, vec!["fs"]);
}

#[test]
fn rejects_unknown_top_level_key() {
    let err = RelayConfig::load_from_str(r#"{ unexpected: true }"#).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("config:unexpected"));
    assert!(msg.contains("unknown key"));
}

#[test]
fn rejects_wrong_value_type_with_path() {
    let err = RelayConfig::load_from_str(r#"{ session: { max_active: "many" } }"#).unwrap_err();
    match err {
        ConfigError::InvalidField { path, .. } => assert_eq!(path, "config:session.max_active"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn rejects_mcp_server_without_command() {
    let err = RelayConfig::load_from_str(r#"{ mcp_servers: [{ id: "fs" }] }"#).unwrap_err();
    assert!(format!("{err}").contains("mcp_servers[0].command"));
}

#[test]
fn rejects_separator_in_mcp_server_id() {
    let err = RelayConfig::load_from_str(r#"{ mcp_servers: [{ id: "my_fs", command: "x" }] }"#)
        .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn rejects_duplicate_mcp_server_ids() {
    let config = RelayConfig::builder()
        .mcp_server(McpServerConfig::new("fs", "a"))
        .mcp_server(McpServerConfig::new("fs", "b"))
        .build();
    let err = config.validate().unwrap_err();
    assert!(format!("{err}").contains("duplicate"));
}

#[test]
fn rejects_zero_capacity() {
    let err = RelayConfig::load_from_str(r#"{ session: { max_active: 0 } }"#).unwrap_err();
    assert!(format!("{err}").contains("max_active"));
}

#[test]
fn rejects_unknown_log_level() {
    let err = RelayConfig::load_from_str(r#"{ logging: { level: "loud" } }"#).unwrap_err();
    assert!(format!("{err}").contains("logging.level"));
}

#[test]
fn layered_config_respects_precedence() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();
    let project_root = root.join("project");
    fs::create_dir_all(project_root.join(".git")).expect("git");
    let cwd = project_root.join("subdir");
    fs::create_dir_all(&cwd).expect("cwd");

    write_json5(
        &root.join("system.json5"),
        r#"{ server: { port: 1000 }, llm: { model: "system" } }"#,
    );
    write_json5(
        &root.join("user.json5"),
        r#"{ llm: { model: "user" }, session: { max_active: 7 } }"#,
    );
    write_json5(
        &project_root.join(DEFAULT_CONFIG_FILE),
        r#"{ llm: { model: "project" } }"#,
    );
    write_json5(&cwd.join(DEFAULT_CONFIG_FILE), r#"{ llm: { model: "cwd" } }"#);

    let layered =
        RelayConfig::load_layered_with_options(isolated_options(root, &cwd)).expect("layered");
    assert_eq!(layered.config.llm.model, "cwd");
    assert_eq!(layered.config.server.port, 1000);
    assert_eq!(layered.config.session.max_active, 7);
    let sources: Vec<ConfigLayerSource> =
        layered.layers.iter().map(|layer| layer.source).collect();
    assert_eq!(
        sources,
        vec![
            ConfigLayerSource::System,
            ConfigLayerSource::User,
            ConfigLayerSource::Project,
            ConfigLayerSource::Cwd,
        ]
    );
}

#[test]
fn runtime_layer_wins_and_replaces_arrays() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();
    let cwd = root.join("work");
    fs::create_dir_all(&cwd).expect("cwd");

    write_json5(
        &cwd.join(DEFAULT_CONFIG_FILE),
        r#"{ mcp_servers: [{ id: "a", command: "a" }, { id: "b", command: "b" }] }"#,
    );
    let runtime = root.join("override.json5");
    write_json5(&runtime, r#"{ mcp_servers: [{ id: "c", command: "c" }] }"#);

    let options = isolated_options(root, &cwd).with_runtime_path(&runtime);
    let layered = RelayConfig::load_layered_with_options(options).expect("layered");
    let ids: Vec<&str> = layered
        .config
        .mcp_servers
        .iter()
        .map(|server| server.id.as_str())
        .collect();
    assert_eq!(ids, vec!["c"]);
    assert_eq!(layered.layers.last().map(|l| l.source), Some(ConfigLayerSource::Runtime));
}

#[test]
fn cwd_equal_to_project_root_is_loaded_once() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();
    let project_root = root.join("project");
    fs::create_dir_all(project_root.join(".git")).expect("git");
    write_json5(&project_root.join(DEFAULT_CONFIG_FILE), r#"{ server: { port: 42 } }"#);

    let layered = RelayConfig::load_layered_with_options(isolated_options(root, &project_root))
        .expect("layered");
    assert_eq!(layered.layers.len(), 1);
    assert_eq!(layered.layers[0].source, ConfigLayerSource::Project);
    assert_eq!(layered.config.server.port, 42);
}

#[test]
fn schema_errors_name_the_layer() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();
    let cwd = root.join("work");
    fs::create_dir_all(&cwd).expect("cwd");
    write_json5(&root.join("user.json5"), r#"{ server: { bogus: 1 } }"#);

    let err = RelayConfig::load_layered_with_options(isolated_options(root, &cwd)).unwrap_err();
    match err {
        ConfigError::InvalidField { path, message } => {
            assert!(path.starts_with("user("));
            assert!(path.ends_with(":server.bogus"));
            assert_eq!(message, "unknown key");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn missing_runtime_layer_is_an_error() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();
    let options = isolated_options(root, root).with_runtime_path(root.join("absent.json5"));
    let err = RelayConfig::load_layered_with_options(options).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFailed(_)));
}
