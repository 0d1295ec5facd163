use chrono::Utc;
use relay_rs_core::{Orchestrator, Reaper, SessionStore};
use std::sync::Arc;

/// Shared handles managed by Rocket.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub reaper: Arc<Reaper>,
    /// Unix timestamp reported as the model's `created` field.
    pub started_at: i64,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, reaper: Arc<Reaper>) -> Self {
        Self {
            orchestrator,
            reaper,
            started_at: Utc::now().timestamp(),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        self.orchestrator.sessions()
    }

    pub fn model_name(&self) -> &str {
        &self.orchestrator.config().default_model
    }
}
