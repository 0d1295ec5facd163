use crate::error::ApiError;
use crate::state::AppState;
use futures_util::{Stream, StreamExt, stream};
use log::{info, warn};
use relay_rs_core::SessionStats;
use relay_rs_protocol::ChatRequest;
use rocket::http::Status;
use rocket::response::stream::{Event, EventStream};
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::{Catcher, Request, Route, State, catch, catchers, get, options, post, routes};
use serde_json::{Value, json};

pub(crate) const SESSION_HEADER: &str = "X-Session-Id";

pub(crate) fn all() -> Vec<Route> {
    routes![
        chat_completions,
        chat_completions_compat,
        chat_preflight,
        chat_preflight_compat,
        health,
        models,
        models_compat,
        session_stats,
    ]
}

pub(crate) fn catchers() -> Vec<Catcher> {
    catchers![json_catcher]
}

/// Server-sent chat chunks, tagged with the session they belong to.
pub(crate) struct ChatStream<S> {
    session_id: String,
    events: EventStream<S>,
}

impl<'r, S: Stream<Item = Event> + Send + 'r> Responder<'r, 'r> for ChatStream<S> {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'r> {
        let mut response = self.events.respond_to(request)?;
        response.set_raw_header(SESSION_HEADER, self.session_id);
        Ok(response)
    }
}

async fn start_chat(
    state: &AppState,
    request: ChatRequest,
) -> Result<ChatStream<impl Stream<Item = Event> + Send + 'static>, ApiError> {
    if request.messages.is_empty() {
        return Err(ApiError::new(
            Status::BadRequest,
            "invalid_request_error",
            "messages must not be empty",
        ));
    }
    if !request.stream {
        warn!("non-streaming request received; responding with a stream");
    }
    let session = state.sessions().create(request.session_id.as_deref());
    info!(
        "chat request (session_id={}, messages={})",
        session.id,
        request.messages.len()
    );

    let run = state.orchestrator.run(&session.id, request).await?;
    let events = run
        .map(|chunk| Event::json(&chunk))
        .chain(stream::once(async { Event::data("[DONE]") }));
    Ok(ChatStream {
        session_id: session.id,
        events: EventStream::from(events),
    })
}

#[post("/v1/chat/completions", format = "json", data = "<request>")]
async fn chat_completions(
    state: &State<AppState>,
    request: Json<ChatRequest>,
) -> Result<ChatStream<impl Stream<Item = Event> + Send + 'static>, ApiError> {
    start_chat(state, request.into_inner()).await
}

#[post("/chat/completions", format = "json", data = "<request>")]
async fn chat_completions_compat(
    state: &State<AppState>,
    request: Json<ChatRequest>,
) -> Result<ChatStream<impl Stream<Item = Event> + Send + 'static>, ApiError> {
    start_chat(state, request.into_inner()).await
}

#[options("/v1/chat/completions")]
fn chat_preflight() -> Status {
    Status::Ok
}

#[options("/chat/completions")]
fn chat_preflight_compat() -> Status {
    Status::Ok
}

#[get("/health")]
fn health(state: &State<AppState>) -> Json<Value> {
    let reaper_healthy = state.reaper.health_check();
    Json(json!({
        "status": if reaper_healthy { "healthy" } else { "degraded" },
        "sessions": state.sessions().stats(),
        "reaper_healthy": reaper_healthy,
    }))
}

fn model_list(state: &AppState) -> Json<Value> {
    Json(json!({
        "object": "list",
        "data": [{
            "id": state.model_name(),
            "object": "model",
            "created": state.started_at,
            "owned_by": "relay",
        }],
    }))
}

#[get("/v1/models")]
fn models(state: &State<AppState>) -> Json<Value> {
    model_list(state)
}

#[get("/models")]
fn models_compat(state: &State<AppState>) -> Json<Value> {
    model_list(state)
}

#[get("/v1/sessions/stats")]
fn session_stats(state: &State<AppState>) -> Json<SessionStats> {
    Json(state.sessions().stats())
}

#[catch(default)]
fn json_catcher(status: Status, request: &Request<'_>) -> (Status, Json<Value>) {
    warn!(
        "unhandled request (method={}, path={}, status={})",
        request.method(),
        request.uri().path(),
        status.code
    );
    (
        status,
        Json(json!({
            "error": {
                "message": status.reason().unwrap_or("request failed"),
                "type": "invalid_request_error",
                "code": status.code,
            }
        })),
    )
}
