//! Bounded in-memory session registry with sliding expiry and eviction.
//!
//! Every operation takes the registry lock once, so mutations are serialized
//! and two concurrent `create` calls for the same unknown id converge on one
//! session. Callers receive copies and must re-fetch on each access.

use chrono::{DateTime, Utc};
use log::{debug, info};
use parking_lot::RwLock;
use relay_rs_config::SessionConfig;
use relay_rs_protocol::Message;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// One conversation tracked by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub messages: Vec<Message>,
    pub metadata: Map<String, Value>,
    /// Cleared on eviction or when expiry is detected.
    pub active: bool,
}

impl Session {
    fn new(id: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at: now,
            last_accessed: now,
            messages: Vec::new(),
            metadata: Map::new(),
            active: true,
        }
    }

    /// Inactive, or idle for longer than `timeout`.
    fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        if !self.active {
            return true;
        }
        // A negative idle time (clock skew) fails `to_std` and counts as fresh.
        now.signed_duration_since(self.last_accessed)
            .to_std()
            .map(|idle| idle > timeout)
            .unwrap_or(false)
    }
}

/// Limits shared by every session in a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub timeout: Duration,
    pub max_active: usize,
}

impl SessionSettings {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            max_active: config.max_active.max(1),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

/// Registry counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub total: usize,
    pub active: usize,
    pub expired: usize,
    pub max_active: usize,
    /// Session timeout in seconds.
    pub timeout: u64,
}

/// Shared handle to the session registry.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    settings: SessionSettings,
}

impl SessionStore {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            settings,
        }
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    /// Return the live session for `id`, or create one.
    ///
    /// An active, unexpired session is returned as-is (with a refreshed access
    /// time). Creating a new session first enforces capacity, which may evict
    /// the least recently accessed session.
    pub fn create(&self, id: Option<&str>) -> Session {
        let now = Utc::now();
        let mut sessions = self.sessions.write();

        if let Some(id) = id
            && let Some(existing) = sessions.get_mut(id)
            && !existing.is_expired(now, self.settings.timeout)
        {
            existing.last_accessed = now;
            debug!("reusing session (session_id={})", id);
            return existing.clone();
        }

        self.enforce_capacity(&mut sessions, now);

        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let session = Session::new(id.clone(), now);
        sessions.insert(id.clone(), session.clone());
        info!(
            "created session (session_id={}, total={})",
            id,
            sessions.len()
        );
        session
    }

    /// Look up a live session, refreshing its access time.
    pub fn get(&self, id: &str) -> Option<Session> {
        self.with_live_session(id, |session| session.clone())
    }

    /// Append a message; false when the session is absent or expired.
    pub fn append_message(&self, id: &str, message: Message) -> bool {
        self.with_live_session(id, |session| {
            debug!(
                "appending message (session_id={}, role={}, content_len={})",
                id,
                message.role.as_str(),
                message.content_len()
            );
            session.messages.push(message);
        })
        .is_some()
    }

    /// Copy of the message log, keeping the most recent `limit` when given.
    pub fn messages(&self, id: &str, limit: Option<usize>) -> Vec<Message> {
        self.with_live_session(id, |session| {
            let skip = limit
                .map(|limit| session.messages.len().saturating_sub(limit))
                .unwrap_or(0);
            session.messages[skip..].to_vec()
        })
        .unwrap_or_default()
    }

    /// Set one metadata entry; false when the session is absent or expired.
    pub fn set_metadata(&self, id: &str, key: impl Into<String>, value: Value) -> bool {
        self.with_live_session(id, |session| {
            session.metadata.insert(key.into(), value);
        })
        .is_some()
    }

    /// Read one metadata entry, or the whole mapping when `key` is `None`.
    pub fn get_metadata(&self, id: &str, key: Option<&str>) -> Option<Value> {
        self.with_live_session(id, |session| match key {
            Some(key) => session.metadata.get(key).cloned(),
            None => Some(Value::Object(session.metadata.clone())),
        })
        .flatten()
    }

    /// Hard-remove a session.
    pub fn delete(&self, id: &str) -> bool {
        let removed = self.sessions.write().remove(id).is_some();
        if removed {
            info!("deleted session (session_id={})", id);
        }
        removed
    }

    /// Hard-delete every expired or evicted session; returns the count removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.write();
        Self::remove_expired(&mut sessions, Utc::now(), self.settings.timeout)
    }

    pub fn stats(&self) -> SessionStats {
        let now = Utc::now();
        let sessions = self.sessions.read();
        let expired = sessions
            .values()
            .filter(|session| session.is_expired(now, self.settings.timeout))
            .count();
        SessionStats {
            total: sessions.len(),
            active: sessions.len() - expired,
            expired,
            max_active: self.settings.max_active,
            timeout: self.settings.timeout.as_secs(),
        }
    }

    /// Number of sessions that are active and unexpired.
    pub fn active_count(&self) -> usize {
        let now = Utc::now();
        Self::count_active(&self.sessions.read(), now, self.settings.timeout)
    }

    /// Drop every session.
    pub fn clear(&self) {
        let mut sessions = self.sessions.write();
        info!("clearing sessions (count={})", sessions.len());
        sessions.clear();
    }

    /// Run `f` on a live session after refreshing its access time. Expired
    /// sessions are marked inactive and yield `None`.
    fn with_live_session<R>(&self, id: &str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(id)?;
        if session.is_expired(now, self.settings.timeout) {
            if session.active {
                debug!("session expired (session_id={})", id);
                session.active = false;
            }
            return None;
        }
        session.last_accessed = now;
        Some(f(session))
    }

    /// Make room for one new session.
    fn enforce_capacity(&self, sessions: &mut HashMap<String, Session>, now: DateTime<Utc>) {
        let timeout = self.settings.timeout;
        if Self::count_active(sessions, now, timeout) < self.settings.max_active {
            return;
        }
        let removed = Self::remove_expired(sessions, now, timeout);
        if Self::count_active(sessions, now, timeout) < self.settings.max_active {
            debug!("capacity recovered by cleanup (removed={})", removed);
            return;
        }
        let oldest = sessions
            .values_mut()
            .filter(|session| !session.is_expired(now, timeout))
            .min_by_key(|session| session.last_accessed);
        if let Some(session) = oldest {
            session.active = false;
            info!(
                "evicted session at capacity (session_id={}, max_active={})",
                session.id, self.settings.max_active
            );
        }
    }

    fn count_active(
        sessions: &HashMap<String, Session>,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> usize {
        sessions
            .values()
            .filter(|session| !session.is_expired(now, timeout))
            .count()
    }

    fn remove_expired(
        sessions: &mut HashMap<String, Session>,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> usize {
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now, timeout));
        before - sessions.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionSettings::default())
    }
}
