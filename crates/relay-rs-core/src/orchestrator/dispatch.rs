//! Execution of a single finalized tool-call draft.

use crate::accumulator::ToolCallDraft;
use crate::record::{PendingCall, ToolCallRecord};
use crate::repair::{RepairOutcome, RepairedArguments, repair_arguments};
use log::{debug, error, info, warn};
use relay_rs_protocol::{ContentItem, Message, ToolOutput, ToolProvider};
use serde_json::{Map, Value, json};
use std::time::Duration;

pub(crate) const MISSING_FUNCTION_NAME: &str = "missing function name";

/// Terminal record plus the tool message that answers the call.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ToolOutcome {
    pub(crate) record: ToolCallRecord,
    pub(crate) message: Message,
}

/// Repair a draft's argument buffer, logging anything short of a clean parse.
pub(crate) fn resolve_arguments(draft: &ToolCallDraft) -> Map<String, Value> {
    let RepairedArguments { arguments, outcome } = repair_arguments(&draft.arguments);
    match outcome {
        RepairOutcome::Parsed => {}
        RepairOutcome::Repaired => warn!(
            "repaired tool arguments (call_id={}, tool={})",
            draft.id, draft.name
        ),
        RepairOutcome::Degraded => error!(
            "unparseable tool arguments; calling with empty arguments (call_id={}, tool={}, raw_len={})",
            draft.id,
            draft.name,
            draft.arguments.len()
        ),
    }
    arguments
}

/// Run one call to a terminal state. Never fails: every error becomes a
/// `failed` record and an `{"error": ..}` tool message.
pub(crate) async fn execute_call(
    tools: &dyn ToolProvider,
    draft: &ToolCallDraft,
    arguments: Map<String, Value>,
    timeout: Duration,
) -> ToolOutcome {
    if draft.name.is_empty() {
        warn!("tool call without function name (call_id={})", draft.id);
        let record = ToolCallRecord::failed(&draft.id, "", arguments, MISSING_FUNCTION_NAME);
        return ToolOutcome {
            message: Message::tool(&draft.id, "", error_payload(MISSING_FUNCTION_NAME)),
            record,
        };
    }

    let call = PendingCall::new(&draft.id, &draft.name, arguments.clone()).begin();
    info!(
        "executing tool (call_id={}, tool={})",
        draft.id, draft.name
    );
    let record = match tokio::time::timeout(timeout, tools.call(&draft.name, arguments)).await {
        Ok(Ok(output)) => call.complete(normalize_output(output)),
        Ok(Err(err)) => call.fail(err.to_string()),
        Err(_) => call.fail(format!(
            "tool `{}` timed out after {}s",
            draft.name,
            timeout.as_secs_f64()
        )),
    };

    let content = match (&record.result, &record.error) {
        (Some(result), _) => render_result(result),
        (None, Some(error)) => {
            warn!(
                "tool failed (call_id={}, tool={}, error={})",
                draft.id, draft.name, error
            );
            error_payload(error)
        }
        (None, None) => String::new(),
    };
    debug!(
        "tool finished (call_id={}, tool={}, status={:?}, content_len={})",
        draft.id,
        draft.name,
        record.status,
        content.len()
    );
    ToolOutcome {
        message: Message::tool(&draft.id, &draft.name, content),
        record,
    }
}

/// Convert a raw tool result into plain JSON.
pub(crate) fn normalize_output(output: ToolOutput) -> Value {
    match output {
        ToolOutput::Text(text) => parse_text(text),
        ToolOutput::Structured(value) => value,
        ToolOutput::Content(items) => Value::Array(items.into_iter().map(normalize_item).collect()),
    }
}

fn normalize_item(item: ContentItem) -> Value {
    match item {
        ContentItem::Text(text) => parse_text(text),
        ContentItem::Image { mime_type } => Value::String(format!("[image: {mime_type}]")),
        ContentItem::Opaque { kind, value } => Value::String(format!("[{kind}] {value}")),
    }
}

/// Text that is itself JSON is returned parsed.
fn parse_text(text: String) -> Value {
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

/// Tool message content: plain text stays as-is, anything else is JSON.
pub(crate) fn render_result(result: &Value) -> String {
    match result {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn error_payload(message: &str) -> String {
    json!({ "error": message }).to_string()
}
