//! OpenAI-compatible HTTP surface for the Relay gateway.
//!
//! ## Endpoints
//!
//! - `POST /v1/chat/completions`, `POST /chat/completions` - streamed chat
//! - `OPTIONS` on both chat paths - CORS preflight
//! - `GET /health` - session stats and reaper health
//! - `GET /v1/models`, `GET /models` - the configured model
//! - `GET /v1/sessions/stats` - session registry counters

mod cors;
mod error;
mod routes;
mod state;

pub use error::ApiError;
pub use state::AppState;

use relay_rs_config::ServerConfig;
use rocket::{Build, Rocket};

/// Assemble the Rocket instance serving every endpoint.
pub fn build_rocket(state: AppState, server: &ServerConfig) -> Rocket<Build> {
    let figment = rocket::Config::figment()
        .merge(("address", server.host.clone()))
        .merge(("port", server.port));
    rocket::custom(figment)
        .manage(state)
        .attach(cors::Cors)
        .mount("/", routes::all())
        .register("/", routes::catchers())
}
