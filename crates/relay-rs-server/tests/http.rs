//! HTTP surface tests against a local Rocket client.

use pretty_assertions::assert_eq;
use relay_rs_config::ServerConfig;
use relay_rs_core::{Orchestrator, OrchestratorConfig, Reaper, SessionStore};
use relay_rs_protocol::{ChatCompletionChunk, FinishReason, StreamFragment};
use relay_rs_server::{AppState, build_rocket};
use relay_rs_test_utils::{DummyToolProvider, ScriptedModel};
use rocket::http::{ContentType, Status};
use rocket::local::asynchronous::Client;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

async fn client_with(model: ScriptedModel, tools: DummyToolProvider) -> Client {
    let sessions = SessionStore::default();
    let config = OrchestratorConfig {
        announce_tools: false,
        ..OrchestratorConfig::default()
    };
    let orchestrator = Orchestrator::new(Arc::new(model), Arc::new(tools), sessions.clone(), config);
    let reaper = Arc::new(Reaper::new(sessions, Duration::from_secs(60)));
    let state = AppState::new(orchestrator, reaper);
    Client::tracked(build_rocket(state, &ServerConfig::default()))
        .await
        .expect("rocket client")
}

/// `data:` payloads of an event-stream body, in order.
fn data_lines(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.trim().to_string())
        .collect()
}

fn chat_body(session_id: Option<&str>, text: &str) -> String {
    let mut body = json!({
        "model": "gpt-4o-mini",
        "messages": [{"role": "user", "content": text}],
        "stream": true,
    });
    if let Some(session_id) = session_id {
        body["session_id"] = json!(session_id);
    }
    body.to_string()
}

#[rocket::async_test]
async fn chat_streams_chunks_then_done() {
    let client = client_with(ScriptedModel::text(&["4"]), DummyToolProvider::empty()).await;

    let response = client
        .post("/v1/chat/completions")
        .header(ContentType::JSON)
        .body(chat_body(Some("s-1"), "What is 2+2?"))
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.content_type(), Some(ContentType::EventStream));
    assert_eq!(response.headers().get_one("X-Session-Id"), Some("s-1"));
    let body = response.into_string().await.expect("body");
    let lines = data_lines(&body);
    assert_eq!(lines.last().map(String::as_str), Some("[DONE]"));

    let chunks: Vec<ChatCompletionChunk> = lines[..lines.len() - 1]
        .iter()
        .map(|line| serde_json::from_str(line).expect("chunk"))
        .collect();
    let text: String = chunks.iter().filter_map(|c| c.content()).collect();
    assert_eq!(text, "4");
    assert_eq!(
        chunks.last().and_then(|c| c.finish_reason()),
        Some(&FinishReason::Stop)
    );
}

#[rocket::async_test]
async fn compat_path_generates_a_session() {
    let client = client_with(ScriptedModel::text(&["hi"]), DummyToolProvider::empty()).await;

    let response = client
        .post("/chat/completions")
        .header(ContentType::JSON)
        .body(chat_body(None, "hello"))
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Ok);
    let session_id = response
        .headers()
        .get_one("X-Session-Id")
        .map(str::to_string)
        .expect("session header");
    assert!(!session_id.is_empty());
    response.into_string().await.expect("body");

    let stats: Value = client
        .get("/v1/sessions/stats")
        .dispatch()
        .await
        .into_json()
        .await
        .expect("stats");
    assert_eq!(stats["total"], json!(1));
    assert_eq!(stats["active"], json!(1));
}

#[rocket::async_test]
async fn dangling_tool_message_is_a_bad_request() {
    let client = client_with(ScriptedModel::text(&["unused"]), DummyToolProvider::empty()).await;
    let body = json!({
        "messages": [
            {"role": "user", "content": "hi"},
            {"role": "tool", "tool_call_id": "call_ghost", "content": "3"}
        ]
    });

    let response = client
        .post("/v1/chat/completions")
        .header(ContentType::JSON)
        .body(body.to_string())
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::BadRequest);
    let error: Value = response.into_json().await.expect("json");
    assert_eq!(error["error"]["type"], json!("invalid_request_error"));
}

#[rocket::async_test]
async fn malformed_json_gets_a_json_error() {
    let client = client_with(ScriptedModel::default(), DummyToolProvider::empty()).await;

    let response = client
        .post("/v1/chat/completions")
        .header(ContentType::JSON)
        .body("{not json")
        .dispatch()
        .await;

    assert_eq!(response.status().class(), rocket::http::StatusClass::ClientError);
    let error: Value = response.into_json().await.expect("json");
    assert!(error["error"]["code"].is_number());
}

#[rocket::async_test]
async fn preflight_allows_any_origin() {
    let client = client_with(ScriptedModel::default(), DummyToolProvider::empty()).await;

    let response = client.options("/v1/chat/completions").dispatch().await;

    assert_eq!(response.status(), Status::Ok);
    assert_eq!(
        response.headers().get_one("Access-Control-Allow-Origin"),
        Some("*")
    );
    assert_eq!(
        response.headers().get_one("Access-Control-Allow-Credentials"),
        None
    );
}

#[rocket::async_test]
async fn models_lists_the_configured_model() {
    let client = client_with(ScriptedModel::default(), DummyToolProvider::empty()).await;

    for path in ["/v1/models", "/models"] {
        let models: Value = client
            .get(path)
            .dispatch()
            .await
            .into_json()
            .await
            .expect("models");
        assert_eq!(models["object"], json!("list"));
        assert_eq!(models["data"][0]["id"], json!("gpt-4o-mini"));
    }
}

#[rocket::async_test]
async fn health_reports_sessions_and_reaper() {
    let client = client_with(ScriptedModel::default(), DummyToolProvider::empty()).await;

    let health: Value = client
        .get("/health")
        .dispatch()
        .await
        .into_json()
        .await
        .expect("health");

    assert_eq!(health["status"], json!("healthy"));
    assert_eq!(health["reaper_healthy"], json!(true));
    assert_eq!(health["sessions"]["total"], json!(0));
}

#[rocket::async_test]
async fn tool_rounds_stream_through_http() {
    let model = ScriptedModel::new(vec![
        vec![
            StreamFragment::tool_call(0, Some("call_a"), Some("calc_add"), Some("{\"a\":2,\"b\":2}")),
            StreamFragment::finish(FinishReason::ToolCalls),
        ],
        vec![
            StreamFragment::text("4"),
            StreamFragment::finish(FinishReason::Stop),
        ],
    ]);
    let tools = DummyToolProvider::new("calc_add").with_result(json!(4));
    let client = client_with(model.clone(), tools.clone()).await;

    let response = client
        .post("/v1/chat/completions")
        .header(ContentType::JSON)
        .body(chat_body(Some("s-tools"), "add"))
        .dispatch()
        .await;
    let body = response.into_string().await.expect("body");

    assert_eq!(data_lines(&body).last().map(String::as_str), Some("[DONE]"));
    assert_eq!(tools.calls().len(), 1);
    assert_eq!(model.call_count(), 2);
}
