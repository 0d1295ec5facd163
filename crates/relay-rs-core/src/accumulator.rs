//! Reassembly of streamed fragments into one round's content and tool calls.

use relay_rs_protocol::{FUNCTION_CALL_TYPE, FinishReason, StreamFragment, ToolCall};
use log::warn;
use relay_rs_protocol::{FunctionCall, ToolCallDelta};
use uuid::Uuid;

/// Highest number of tool calls accepted in one round; deltas whose index
/// falls outside it are dropped.
pub const MAX_TOOL_CALLS_PER_ROUND: usize = 128;

/// Synthesize a `call_<random>` id for drafts the provider has not named yet.
pub fn placeholder_call_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    format!("call_{id}")
}

/// An in-progress tool call being assembled from fragments.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallDraft {
    pub id: String,
    pub kind: String,
    pub name: String,
    /// Concatenated argument chunks, in arrival order.
    pub arguments: String,
}

impl ToolCallDraft {
    fn placeholder() -> Self {
        Self {
            id: placeholder_call_id(),
            kind: FUNCTION_CALL_TYPE.to_string(),
            name: String::new(),
            arguments: String::new(),
        }
    }

    fn merge(&mut self, delta: &ToolCallDelta) {
        if let Some(id) = delta.id.as_deref().filter(|id| !id.is_empty()) {
            self.id = id.to_string();
        }
        if let Some(kind) = delta.kind.as_deref().filter(|kind| !kind.is_empty()) {
            self.kind = kind.to_string();
        }
        let Some(function) = &delta.function else {
            return;
        };
        if let Some(name) = function.name.as_deref().filter(|name| !name.is_empty()) {
            self.name = name.to_string();
        }
        if let Some(chunk) = function.arguments.as_deref() {
            self.arguments.push_str(chunk);
        }
    }

    /// Finalized call as carried by the assistant message.
    pub fn to_tool_call(&self) -> ToolCall {
        ToolCall {
            id: self.id.clone(),
            kind: self.kind.clone(),
            function: FunctionCall {
                name: self.name.clone(),
                arguments: self.arguments.clone(),
            },
        }
    }
}

/// Accumulator for one orchestration round.
///
/// Each fragment must be applied exactly once: content and argument chunks
/// are appended, so re-applying a fragment duplicates them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundState {
    content: String,
    /// Drafts keyed by stream index; position `i` holds index `i`.
    drafts: Vec<ToolCallDraft>,
    finish_reason: Option<FinishReason>,
}

impl RoundState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one fragment into the round.
    pub fn apply(&mut self, fragment: &StreamFragment) {
        if let Some(reason) = &fragment.finish_reason {
            self.finish_reason = Some(reason.clone());
        }
        if let Some(content) = &fragment.content {
            self.content.push_str(content);
        }
        for delta in &fragment.tool_calls {
            if delta.index >= MAX_TOOL_CALLS_PER_ROUND {
                warn!(
                    "dropping tool call delta with out-of-range index (index={}, max={})",
                    delta.index, MAX_TOOL_CALLS_PER_ROUND
                );
                continue;
            }
            if self.drafts.len() <= delta.index {
                self.drafts
                    .resize_with(delta.index + 1, ToolCallDraft::placeholder);
            }
            self.drafts[delta.index].merge(delta);
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Drafts in index order, gap-free.
    pub fn drafts(&self) -> &[ToolCallDraft] {
        &self.drafts
    }

    /// Last non-null finish reason seen.
    pub fn finish_reason(&self) -> Option<&FinishReason> {
        self.finish_reason.as_ref()
    }

    /// True when the model asked for tools and at least one draft exists.
    pub fn is_tool_call_terminal(&self) -> bool {
        self.finish_reason == Some(FinishReason::ToolCalls) && !self.drafts.is_empty()
    }

    /// Consume the round, yielding its text and drafts.
    pub fn into_parts(self) -> (String, Vec<ToolCallDraft>) {
        (self.content, self.drafts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn apply_all(fragments: &[StreamFragment]) -> RoundState {
        let mut state = RoundState::new();
        for fragment in fragments {
            state.apply(fragment);
        }
        state
    }

    #[test]
    fn content_is_appended_in_order() {
        let state = apply_all(&[
            StreamFragment::text("Hel"),
            StreamFragment::text("lo"),
            StreamFragment::finish(FinishReason::Stop),
        ]);
        assert_eq!(state.content(), "Hello");
        assert_eq!(state.finish_reason(), Some(&FinishReason::Stop));
        assert_eq!(state.is_tool_call_terminal(), false);
    }

    #[test]
    fn reapplying_a_fragment_doubles_content() {
        let fragment = StreamFragment::text("ab");
        let state = apply_all(&[fragment.clone(), fragment]);
        assert_eq!(state.content(), "abab");
    }

    #[test]
    fn arguments_concatenate_and_names_overwrite() {
        let state = apply_all(&[
            StreamFragment::tool_call(0, Some("call_1"), Some("calc_add"), Some("{\"a\"")),
            StreamFragment::tool_call(0, None, Some(""), Some(":1")),
            StreamFragment::tool_call(0, Some(""), None, Some("}")),
            StreamFragment::finish(FinishReason::ToolCalls),
        ]);
        assert_eq!(
            state.drafts(),
            &[ToolCallDraft {
                id: "call_1".to_string(),
                kind: "function".to_string(),
                name: "calc_add".to_string(),
                arguments: "{\"a\":1}".to_string(),
            }]
        );
        assert!(state.is_tool_call_terminal());
    }

    #[test]
    fn out_of_order_indices_fill_gaps() {
        let state = apply_all(&[
            StreamFragment::tool_call(2, Some("call_c"), Some("c"), None),
            StreamFragment::tool_call(0, Some("call_a"), Some("a"), None),
        ]);
        let drafts = state.drafts();
        assert_eq!(drafts.len(), 3);
        assert_eq!(drafts[0].id, "call_a");
        assert_eq!(drafts[2].id, "call_c");
        assert!(drafts[1].id.starts_with("call_"));
        assert_eq!(drafts[1].id.len(), "call_".len() + 8);
        assert_eq!(drafts[1].name, "");

        let ids: HashSet<&str> = drafts.iter().map(|draft| draft.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn index_one_before_index_zero_keeps_order() {
        let state = apply_all(&[
            StreamFragment::tool_call(1, Some("call_b"), Some("b"), Some("{}")),
            StreamFragment::tool_call(0, Some("call_a"), Some("a"), Some("{}")),
            StreamFragment::tool_call(1, None, None, Some("")),
        ]);
        let names: Vec<&str> = state.drafts().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn finish_reason_is_last_write_wins() {
        let state = apply_all(&[
            StreamFragment::tool_call(0, Some("call_a"), Some("a"), None),
            StreamFragment::finish(FinishReason::ToolCalls),
            StreamFragment::text("trailing"),
            StreamFragment::finish(FinishReason::Stop),
        ]);
        assert_eq!(state.finish_reason(), Some(&FinishReason::Stop));
        assert_eq!(state.is_tool_call_terminal(), false);
    }

    #[test]
    fn tool_calls_reason_without_drafts_is_not_terminal() {
        let state = apply_all(&[StreamFragment::finish(FinishReason::ToolCalls)]);
        assert_eq!(state.is_tool_call_terminal(), false);
    }

    #[test]
    fn out_of_range_index_is_dropped() {
        let state = apply_all(&[
            StreamFragment::tool_call(usize::MAX, Some("call_x"), Some("t"), Some("{}")),
            StreamFragment::tool_call(MAX_TOOL_CALLS_PER_ROUND, Some("call_y"), Some("t"), None),
            StreamFragment::tool_call(0, Some("call_a"), Some("a"), Some("{}")),
            StreamFragment::finish(FinishReason::ToolCalls),
        ]);
        let ids: Vec<&str> = state.drafts().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["call_a"]);
        assert!(state.is_tool_call_terminal());
    }

    #[test]
    fn draft_converts_to_tool_call() {
        let state = apply_all(&[StreamFragment::tool_call(
            0,
            Some("call_z"),
            Some("fs_read"),
            Some("{\"path\":\"a\"}"),
        )]);
        let (_, drafts) = state.into_parts();
        let call = drafts[0].to_tool_call();
        assert_eq!(call.id, "call_z");
        assert_eq!(call.kind, "function");
        assert_eq!(call.function.name, "fs_read");
        assert_eq!(call.function.arguments, "{\"path\":\"a\"}");
    }
}
