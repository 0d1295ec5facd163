//! Best-effort parsing of streamed tool-call arguments.
//!
//! Providers stream arguments as successive substrings of one JSON document.
//! When the concatenation is truncated or missing its outer braces a single
//! brace-insertion pass is attempted; anything still unparseable degrades to
//! an empty object so the call can proceed.

use serde_json::{Map, Value};

/// How the final arguments object was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairOutcome {
    /// Input was empty or parsed as an object on the first attempt.
    Parsed,
    /// Input parsed after inserting missing outer braces.
    Repaired,
    /// Input could not be recovered; arguments are empty.
    Degraded,
}

/// Arguments object plus the path that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairedArguments {
    pub arguments: Map<String, Value>,
    pub outcome: RepairOutcome,
}

impl RepairedArguments {
    fn new(arguments: Map<String, Value>, outcome: RepairOutcome) -> Self {
        Self { arguments, outcome }
    }

    fn degraded() -> Self {
        Self::new(Map::new(), RepairOutcome::Degraded)
    }
}

/// Turn a concatenated argument buffer into an arguments object. Never fails.
pub fn repair_arguments(raw: &str) -> RepairedArguments {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return RepairedArguments::new(Map::new(), RepairOutcome::Parsed);
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => return RepairedArguments::new(map, RepairOutcome::Parsed),
        // Valid JSON that is not an object cannot be fixed by adding braces.
        Ok(_) => return RepairedArguments::degraded(),
        Err(_) => {}
    }

    let mut candidate = String::with_capacity(trimmed.len() + 2);
    if !trimmed.starts_with('{') {
        candidate.push('{');
    }
    candidate.push_str(trimmed);
    if !trimmed.ends_with('}') {
        candidate.push('}');
    }

    match serde_json::from_str::<Value>(&candidate) {
        Ok(Value::Object(map)) => RepairedArguments::new(map, RepairOutcome::Repaired),
        _ => RepairedArguments::degraded(),
    }
}

/// Accept arguments that may already be structured.
///
/// Strings go through [`repair_arguments`]; objects are returned as-is and
/// every other shape is coerced to an empty object.
pub fn repair_value(value: Value) -> RepairedArguments {
    match value {
        Value::String(raw) => repair_arguments(&raw),
        Value::Object(map) => RepairedArguments::new(map, RepairOutcome::Parsed),
        Value::Null => RepairedArguments::new(Map::new(), RepairOutcome::Parsed),
        _ => RepairedArguments::degraded(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn concatenated_chunks_parse_strictly() {
        let raw = ["{\"a\"", ":1}"].concat();
        assert_eq!(
            repair_arguments(&raw),
            RepairedArguments::new(object(json!({"a": 1})), RepairOutcome::Parsed)
        );
    }

    #[test]
    fn missing_leading_brace_is_inserted() {
        let repaired = repair_arguments("\"a\":1}");
        assert_eq!(repaired.outcome, RepairOutcome::Repaired);
        assert_eq!(repaired.arguments, object(json!({"a": 1})));
    }

    #[test]
    fn missing_trailing_brace_is_appended() {
        let repaired = repair_arguments("  {\"path\": \"/tmp\", \"depth\": 2 ");
        assert_eq!(repaired.outcome, RepairOutcome::Repaired);
        assert_eq!(repaired.arguments, object(json!({"path": "/tmp", "depth": 2})));
    }

    #[test]
    fn bare_members_get_both_braces() {
        let repaired = repair_arguments("\"q\": \"rust\"");
        assert_eq!(repaired.outcome, RepairOutcome::Repaired);
        assert_eq!(repaired.arguments, object(json!({"q": "rust"})));
    }

    #[test]
    fn irreparable_input_degrades_to_empty() {
        assert_eq!(repair_arguments("not json at all"), RepairedArguments::degraded());
    }

    #[test]
    fn blank_input_is_empty_object() {
        let repaired = repair_arguments(" \n ");
        assert_eq!(repaired.outcome, RepairOutcome::Parsed);
        assert!(repaired.arguments.is_empty());
    }

    #[test]
    fn non_object_json_degrades() {
        assert_eq!(repair_arguments("[1, 2]"), RepairedArguments::degraded());
        assert_eq!(repair_arguments("42"), RepairedArguments::degraded());
    }

    #[test]
    fn structured_values_are_coerced() {
        assert_eq!(
            repair_value(json!({"k": true})).arguments,
            object(json!({"k": true}))
        );
        assert_eq!(repair_value(json!([1])), RepairedArguments::degraded());
        assert_eq!(
            repair_value(json!("{\"k\":1}")).arguments,
            object(json!({"k": 1}))
        );
    }
}
