//! Tool call life cycle.
//!
//! A call moves `pending -> executing -> completed | failed`. The wrapper
//! types make the executing step impossible to skip; the only way to reach
//! `failed` without it is [`ToolCallRecord::failed`], used when dispatch
//! cannot start at all.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    Pending,
    Executing,
    Completed,
    Failed,
}

/// Snapshot of one tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub function_name: String,
    pub arguments: Map<String, Value>,
    pub status: ToolCallStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ToolCallRecord {
    /// Build a record that failed before it could execute.
    pub fn failed(
        id: impl Into<String>,
        function_name: impl Into<String>,
        arguments: Map<String, Value>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            function_name: function_name.into(),
            arguments,
            status: ToolCallStatus::Failed,
            result: None,
            error: Some(error.into()),
            started_at: None,
            completed_at: Some(Utc::now()),
        }
    }

    /// True once the call reached `completed` or `failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            ToolCallStatus::Completed | ToolCallStatus::Failed
        )
    }
}

/// A call that has not started yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCall {
    record: ToolCallRecord,
}

impl PendingCall {
    pub fn new(
        id: impl Into<String>,
        function_name: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Self {
        Self {
            record: ToolCallRecord {
                id: id.into(),
                function_name: function_name.into(),
                arguments,
                status: ToolCallStatus::Pending,
                result: None,
                error: None,
                started_at: None,
                completed_at: None,
            },
        }
    }

    pub fn record(&self) -> &ToolCallRecord {
        &self.record
    }

    /// Mark the call as executing.
    pub fn begin(self) -> ExecutingCall {
        let mut record = self.record;
        record.status = ToolCallStatus::Executing;
        record.started_at = Some(Utc::now());
        ExecutingCall { record }
    }
}

/// A call handed to the tool collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutingCall {
    record: ToolCallRecord,
}

impl ExecutingCall {
    pub fn record(&self) -> &ToolCallRecord {
        &self.record
    }

    pub fn complete(self, result: Value) -> ToolCallRecord {
        let mut record = self.record;
        record.status = ToolCallStatus::Completed;
        record.result = Some(result);
        record.completed_at = Some(Utc::now());
        record
    }

    pub fn fail(self, error: impl Into<String>) -> ToolCallRecord {
        let mut record = self.record;
        record.status = ToolCallStatus::Failed;
        record.error = Some(error.into());
        record.completed_at = Some(Utc::now());
        record
    }
}
