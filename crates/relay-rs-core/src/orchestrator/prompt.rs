//! Request preparation: tool catalog injection and the tool-usage system prompt.

use super::OrchestratorConfig;
use relay_rs_protocol::{ChatRequest, Message, ToolSpec};
use serde_json::Value;

/// Messages and function definitions sent to the model for round one.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PreparedRequest {
    pub(crate) messages: Vec<Message>,
    pub(crate) tools: Option<Vec<Value>>,
}

/// Apply the tool catalog to an inbound request.
///
/// A non-empty catalog replaces the request's own tools and, when enabled,
/// prepends a system prompt describing it. An empty catalog leaves the
/// request's tools untouched.
pub(crate) fn prepare_request(
    request: &ChatRequest,
    catalog: &[ToolSpec],
    config: &OrchestratorConfig,
) -> PreparedRequest {
    if catalog.is_empty() {
        return PreparedRequest {
            messages: request.messages.clone(),
            tools: request.tools.clone().filter(|tools| !tools.is_empty()),
        };
    }

    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if config.inject_system_prompt {
        messages.push(Message::system(build_tool_prompt(catalog)));
    }
    messages.extend(request.messages.iter().cloned());
    PreparedRequest {
        messages,
        tools: Some(
            catalog
                .iter()
                .map(ToolSpec::to_function_definition)
                .collect(),
        ),
    }
}

/// System prompt listing every tool by qualified name.
pub(crate) fn build_tool_prompt(catalog: &[ToolSpec]) -> String {
    let mut prompt = String::from(
        "You are a helpful assistant with access to the following tools:\n\n",
    );
    for tool in catalog {
        prompt.push_str(&format!("- {}: {}\n", tool.name, tool.description));
    }
    prompt.push_str(
        "\nWhen a request needs information or actions these tools provide:\n\
         1. Work out what the user is asking for.\n\
         2. Pick the tool that fits and call it with well-formed JSON arguments.\n\
         3. Answer from the tool results; say so if a tool failed.\n\n\
         Always call tools by the full name shown above, including its prefix.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use relay_rs_protocol::Role;
    use serde_json::json;

    fn spec(name: &str) -> ToolSpec {
        ToolSpec {
            name: name.to_string(),
            description: format!("{name} tool"),
            parameters: json!({"type": "object"}),
        }
    }

    #[test]
    fn empty_catalog_passes_request_tools_through() {
        let mut request = ChatRequest::new(vec![Message::user("hi")]);
        let config = OrchestratorConfig::default();
        assert_eq!(prepare_request(&request, &[], &config).tools, None);

        request.tools = Some(vec![json!({"type": "function"})]);
        let prepared = prepare_request(&request, &[], &config);
        assert_eq!(prepared.tools, request.tools);
        assert_eq!(prepared.messages, request.messages);
    }

    #[test]
    fn catalog_replaces_tools_and_injects_prompt() {
        let mut request = ChatRequest::new(vec![Message::user("hi")]);
        request.tools = Some(vec![json!({"ignored": true})]);
        let prepared = prepare_request(
            &request,
            &[spec("fs_read"), spec("web_search")],
            &OrchestratorConfig::default(),
        );

        assert_eq!(prepared.messages.len(), 2);
        assert_eq!(prepared.messages[0].role, Role::System);
        let prompt = prepared.messages[0].content.clone().unwrap_or_default();
        assert!(prompt.contains("- fs_read: fs_read tool"));
        assert!(prompt.contains("- web_search: web_search tool"));
        assert_eq!(prepared.messages[1], Message::user("hi"));

        let tools = prepared.tools.expect("tools");
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0]["function"]["name"], json!("fs_read"));
    }

    #[test]
    fn prompt_injection_can_be_disabled() {
        let request = ChatRequest::new(vec![Message::user("hi")]);
        let config = OrchestratorConfig {
            inject_system_prompt: false,
            ..OrchestratorConfig::default()
        };
        let prepared = prepare_request(&request, &[spec("fs_read")], &config);
        assert_eq!(prepared.messages, vec![Message::user("hi")]);
        assert!(prepared.tools.is_some());
    }
}
