//! Human-readable notices streamed while tools execute.
//!
//! Notices are content-only chunks for the caller; they never enter the
//! message list sent to the model.

use crate::accumulator::ToolCallDraft;
use crate::record::{ToolCallRecord, ToolCallStatus};
use serde_json::{Map, Value};

const JSON_PREVIEW_CHARS: usize = 500;
const TEXT_PREVIEW_CHARS: usize = 300;

pub(crate) fn round_started(count: usize) -> String {
    format!("\n\n[executing {count} tool call(s)]\n")
}

pub(crate) fn call_summary(
    position: usize,
    draft: &ToolCallDraft,
    arguments: &Map<String, Value>,
) -> String {
    let name = if draft.name.is_empty() {
        "<unnamed>"
    } else {
        draft.name.as_str()
    };
    let pretty = serde_json::to_string_pretty(arguments).unwrap_or_else(|_| "{}".to_string());
    format!("\n{}. `{}`\n```json\n{}\n```\n", position + 1, name, pretty)
}

pub(crate) fn call_running(name: &str) -> String {
    format!("running `{name}`...\n")
}

pub(crate) fn call_finished(record: &ToolCallRecord) -> String {
    match (record.status, &record.result, &record.error) {
        (ToolCallStatus::Completed, Some(result), _) => format!("result:\n{}\n", preview(result)),
        (_, _, Some(error)) => format!("failed: {error}\n"),
        _ => "done\n".to_string(),
    }
}

pub(crate) fn round_finished() -> String {
    "[tool execution finished]\n\n".to_string()
}

/// Truncated rendering of a tool result.
fn preview(result: &Value) -> String {
    match result {
        Value::String(text) => truncate(text, TEXT_PREVIEW_CHARS),
        other => {
            let pretty = serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string());
            format!("```json\n{}\n```", truncate(&pretty, JSON_PREVIEW_CHARS))
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
