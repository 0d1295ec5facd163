//! Layered configuration loader.
//!
//! Discovers configuration layers (system, user, project, cwd, runtime),
//! validates each against the schema, merges them in precedence order and
//! produces the effective `RelayConfig`.

mod layer_io;
mod merge;
mod schema;
mod utils;

#[cfg(test)]
mod tests;

use crate::{ConfigError, RelayConfig};
use log::{debug, info};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Default config filename in every layer.
const DEFAULT_CONFIG_FILE: &str = "relay.json5";
/// Default config directory under the user's home.
const DEFAULT_CONFIG_DIR: &str = ".relay";
/// Marker files/dirs that identify a project root.
const DEFAULT_PROJECT_ROOT_MARKERS: &[&str] = &[".git"];
/// Separator between an MCP server id and its tool names.
pub const QUALIFIED_NAME_SEPARATOR: char = '_';

#[cfg(unix)]
const SYSTEM_CONFIG_PATH: &str = "/etc/relay/relay.json5";
#[cfg(windows)]
const SYSTEM_CONFIG_PATH: &str = "C:\\ProgramData\\relay\\relay.json5";

/// Effective config plus metadata about which layers were loaded.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// The merged, validated config.
    pub config: RelayConfig,
    /// Layers that contributed, lowest precedence first.
    pub layers: Vec<ConfigLayer>,
}

/// Origin for a single config layer in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    System,
    User,
    /// Nearest ancestor directory carrying a project marker.
    Project,
    Cwd,
    /// Explicit override paths (highest precedence).
    Runtime,
}

impl ConfigLayerSource {
    fn as_str(self) -> &'static str {
        match self {
            ConfigLayerSource::System => "system",
            ConfigLayerSource::User => "user",
            ConfigLayerSource::Project => "project",
            ConfigLayerSource::Cwd => "cwd",
            ConfigLayerSource::Runtime => "runtime",
        }
    }
}

/// Metadata about a loaded config layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigLayer {
    pub source: ConfigLayerSource,
    pub path: PathBuf,
}

/// Options controlling layered config discovery and overrides.
#[derive(Debug, Clone)]
pub struct LayeredConfigOptions {
    /// Working directory used to resolve local layers.
    pub cwd: PathBuf,
    /// System config path (defaults to `/etc/relay/relay.json5` on Unix).
    pub system_config_path: Option<PathBuf>,
    /// User config path (defaults to `~/.relay/relay.json5`).
    pub user_config_path: Option<PathBuf>,
    /// Runtime override config paths applied last; each must exist.
    pub runtime_paths: Vec<PathBuf>,
    /// Marker files/dirs used to detect the project root.
    pub project_root_markers: Vec<String>,
}

impl LayeredConfigOptions {
    /// Create options with default layer locations for the provided cwd.
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            system_config_path: layer_io::default_system_config_path(),
            user_config_path: layer_io::default_user_config_path(),
            runtime_paths: Vec::new(),
            project_root_markers: DEFAULT_PROJECT_ROOT_MARKERS
                .iter()
                .map(|marker| marker.to_string())
                .collect(),
        }
    }

    /// Add a runtime override config path that is applied last.
    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().to_path_buf());
        self
    }
}

impl RelayConfig {
    /// Load a single config from a path (no layering).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        info!("loading config from path: {}", path.as_ref().display());
        let contents = fs::read_to_string(path)?;
        Self::load_from_str(&contents)
    }

    /// Load a single config from JSON5 contents (no layering).
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from raw contents (len={})", contents.len());
        let value: Value = json5::from_str(contents)?;
        config_from_value(value, "config")
    }

    /// Load a layered config stack using the default layer locations.
    pub fn load_layered(cwd: impl AsRef<Path>) -> Result<LayeredConfig, ConfigError> {
        Self::load_layered_with_options(LayeredConfigOptions::new(cwd))
    }

    /// Load a layered config stack using explicit layer locations.
    ///
    /// Precedence (low -> high): system, user, project, cwd, runtime.
    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let cwd = utils::normalize_path(&options.cwd)?;
        debug!("loading layered config (cwd={})", cwd.display());

        let mut candidates = Vec::new();
        if let Some(path) = options.system_config_path {
            candidates.push((ConfigLayerSource::System, path));
        }
        if let Some(path) = options.user_config_path {
            candidates.push((ConfigLayerSource::User, path));
        }
        match utils::find_project_root(&cwd, &options.project_root_markers) {
            Some(root) => {
                debug!("resolved project root: {}", root.display());
                candidates.push((ConfigLayerSource::Project, root.join(DEFAULT_CONFIG_FILE)));
            }
            None => debug!("project root not found; skipping project layer"),
        }
        candidates.push((ConfigLayerSource::Cwd, cwd.join(DEFAULT_CONFIG_FILE)));

        let mut seen_paths = HashSet::new();
        let mut loaded = Vec::new();
        for (source, path) in candidates {
            if let Some(layer) = layer_io::load_optional_layer(source, &path)? {
                if seen_paths.insert(utils::unique_path(&path)) {
                    loaded.push(layer);
                } else {
                    debug!(
                        "skipping duplicate layer (source={:?}, path={})",
                        source,
                        path.display()
                    );
                }
            }
        }
        for path in &options.runtime_paths {
            loaded.push(layer_io::load_required_layer(ConfigLayerSource::Runtime, path)?);
        }

        let mut merged = Value::Object(serde_json::Map::new());
        let mut layers = Vec::with_capacity(loaded.len());
        for layer in loaded {
            merge::merge_json_values(&mut merged, &layer.value);
            layers.push(layer.meta);
        }

        let config = config_from_value(merged, "effective")?;
        info!("layered config loaded (layers={})", layers.len());
        Ok(LayeredConfig { config, layers })
    }

    /// Validate invariants that cannot be expressed in serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.max_active == 0 {
            return Err(ConfigError::Invalid(
                "session.max_active must be at least 1".to_string(),
            ));
        }
        if self.orchestration.max_rounds == 0 {
            return Err(ConfigError::Invalid(
                "orchestration.max_rounds must be at least 1".to_string(),
            ));
        }

        let mut ids = HashSet::new();
        for server in &self.mcp_servers {
            if server.id.is_empty() {
                return Err(ConfigError::Invalid(
                    "mcp_servers entries require a non-empty id".to_string(),
                ));
            }
            if server.id.contains(QUALIFIED_NAME_SEPARATOR) {
                return Err(ConfigError::Invalid(format!(
                    "mcp server id `{}` must not contain `{}`",
                    server.id, QUALIFIED_NAME_SEPARATOR
                )));
            }
            if server.command.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "mcp server `{}` requires a command",
                    server.id
                )));
            }
            if !ids.insert(server.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate mcp server id `{}`",
                    server.id
                )));
            }
        }

        Ok(())
    }
}

/// A layer read from disk and schema-checked.
#[derive(Debug, Clone)]
struct LoadedLayer {
    meta: ConfigLayer,
    value: Value,
}

fn config_from_value(value: Value, label: &str) -> Result<RelayConfig, ConfigError> {
    schema::validate_layer_schema(&value, label)?;
    let config: RelayConfig = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}
