//! Registry routing qualified tool names to backends.

use crate::backend::ToolBackend;
use async_trait::async_trait;
use log::{debug, info, warn};
use parking_lot::RwLock;
use relay_rs_config::QUALIFIED_NAME_SEPARATOR;
use relay_rs_protocol::{ToolError, ToolOutput, ToolProvider, ToolSpec};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// In-memory registry of tool backends keyed by id.
#[derive(Default, Clone)]
pub struct ToolHub {
    backends: Arc<RwLock<BTreeMap<String, Arc<dyn ToolBackend>>>>,
}

impl ToolHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend, replacing any previous one with the same id.
    pub fn register(&self, backend: Arc<dyn ToolBackend>) {
        let id = backend.id().to_string();
        info!(
            "registering tool backend (id={}, tools={})",
            id,
            backend.tools().len()
        );
        if self.backends.write().insert(id.clone(), backend).is_some() {
            warn!("replaced existing tool backend (id={})", id);
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn ToolBackend>> {
        self.backends.read().get(id).cloned()
    }

    pub fn backend_ids(&self) -> Vec<String> {
        self.backends.read().keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.read().is_empty()
    }

    /// Catalog of every backend with qualified names.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.backends
            .read()
            .values()
            .flat_map(|backend| {
                let id = backend.id().to_string();
                backend.tools().into_iter().map(move |tool| ToolSpec {
                    name: qualify(&id, &tool.name),
                    ..tool
                })
            })
            .collect()
    }

    /// Find the backend and unprefixed tool name for `qualified_name`.
    ///
    /// The longest registered id followed by the separator wins. Names with no
    /// matching prefix are looked up unprefixed across every backend.
    pub fn resolve(&self, qualified_name: &str) -> Result<(Arc<dyn ToolBackend>, String), ToolError> {
        let backends = self.backends.read();
        let prefixed = backends
            .iter()
            .filter_map(|(id, backend)| {
                qualified_name
                    .strip_prefix(id.as_str())
                    .and_then(|rest| rest.strip_prefix(QUALIFIED_NAME_SEPARATOR))
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| (id.len(), backend, rest))
            })
            .max_by_key(|(len, _, _)| *len);
        if let Some((_, backend, name)) = prefixed {
            return Ok((backend.clone(), name.to_string()));
        }

        backends
            .values()
            .find(|backend| backend.has_tool(qualified_name))
            .map(|backend| {
                debug!(
                    "resolved unprefixed tool (tool={}, backend={})",
                    qualified_name,
                    backend.id()
                );
                (backend.clone(), qualified_name.to_string())
            })
            .ok_or_else(|| ToolError::ToolNotFound(qualified_name.to_string()))
    }

    /// Shut down and drop every backend.
    pub async fn shutdown(&self) {
        let backends: Vec<Arc<dyn ToolBackend>> =
            std::mem::take(&mut *self.backends.write()).into_values().collect();
        for backend in backends {
            info!("shutting down tool backend (id={})", backend.id());
            backend.shutdown().await;
        }
    }
}

fn qualify(backend_id: &str, tool_name: &str) -> String {
    format!("{backend_id}{QUALIFIED_NAME_SEPARATOR}{tool_name}")
}

#[async_trait]
impl ToolProvider for ToolHub {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolError> {
        Ok(self.specs())
    }

    async fn call(
        &self,
        qualified_name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolOutput, ToolError> {
        let (backend, name) = self.resolve(qualified_name)?;
        debug!(
            "routing tool call (qualified={}, backend={}, tool={})",
            qualified_name,
            backend.id(),
            name
        );
        backend.call(&name, arguments).await
    }
}
