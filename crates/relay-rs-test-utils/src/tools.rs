use async_trait::async_trait;
use parking_lot::Mutex;
use relay_rs_protocol::{ToolError, ToolOutput, ToolProvider, ToolSpec};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;

fn dummy_spec(name: &str) -> ToolSpec {
    ToolSpec {
        name: name.to_string(),
        description: "dummy tool".to_string(),
        parameters: json!({"type": "object", "properties": {}}),
    }
}

/// Answers every call with a fixed output and records what it was asked.
#[derive(Debug, Clone)]
pub struct DummyToolProvider {
    catalog: Vec<ToolSpec>,
    output: ToolOutput,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl DummyToolProvider {
    /// Catalog with a single tool named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            catalog: vec![dummy_spec(&name.into())],
            output: ToolOutput::Structured(json!({})),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Provider with no tools in its catalog.
    pub fn empty() -> Self {
        Self {
            catalog: Vec::new(),
            output: ToolOutput::Structured(json!({})),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_tool(mut self, name: impl Into<String>) -> Self {
        self.catalog.push(dummy_spec(&name.into()));
        self
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.output = ToolOutput::Structured(result);
        self
    }

    pub fn with_output(mut self, output: ToolOutput) -> Self {
        self.output = output;
        self
    }

    /// Calls received so far, as `(qualified_name, arguments)`.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ToolProvider for DummyToolProvider {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolError> {
        Ok(self.catalog.clone())
    }

    async fn call(
        &self,
        qualified_name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolOutput, ToolError> {
        self.calls
            .lock()
            .push((qualified_name.to_string(), Value::Object(arguments)));
        Ok(self.output.clone())
    }
}

/// Every call fails with `ExecutionFailed`; optionally the catalog fails too.
#[derive(Debug, Clone)]
pub struct FailingToolProvider {
    message: String,
    fail_listing: bool,
}

impl FailingToolProvider {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fail_listing: false,
        }
    }

    pub fn failing_catalog(mut self) -> Self {
        self.fail_listing = true;
        self
    }
}

#[async_trait]
impl ToolProvider for FailingToolProvider {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolError> {
        if self.fail_listing {
            return Err(ToolError::BackendNotFound(self.message.clone()));
        }
        Ok(vec![dummy_spec("failing_tool")])
    }

    async fn call(
        &self,
        _qualified_name: &str,
        _arguments: Map<String, Value>,
    ) -> Result<ToolOutput, ToolError> {
        Err(ToolError::ExecutionFailed(self.message.clone()))
    }
}

/// Sleeps before answering.
#[derive(Debug, Clone)]
pub struct SlowToolProvider {
    delay: Duration,
}

impl SlowToolProvider {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ToolProvider for SlowToolProvider {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolError> {
        Ok(vec![dummy_spec("slow_op")])
    }

    async fn call(
        &self,
        _qualified_name: &str,
        _arguments: Map<String, Value>,
    ) -> Result<ToolOutput, ToolError> {
        tokio::time::sleep(self.delay).await;
        Ok(ToolOutput::Text("done".to_string()))
    }
}
