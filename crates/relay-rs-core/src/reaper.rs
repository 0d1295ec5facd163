//! Background purge of expired sessions.

use crate::sessions::SessionStore;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Active sessions may exceed capacity by this factor before health degrades.
const HEALTH_OVERCOMMIT: f64 = 1.1;

struct ReaperTask {
    cancellation: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

/// Periodically calls [`SessionStore::cleanup_expired`].
///
/// Must be started from within a Tokio runtime.
pub struct Reaper {
    store: SessionStore,
    interval: Duration,
    task: Mutex<ReaperTask>,
}

impl Reaper {
    pub fn new(store: SessionStore, interval: Duration) -> Self {
        Self {
            store,
            interval: interval.max(Duration::from_millis(1)),
            task: Mutex::new(ReaperTask {
                cancellation: CancellationToken::new(),
                handle: None,
            }),
        }
    }

    /// Spawn the background task unless it is already running.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.handle.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        if task.cancellation.is_cancelled() {
            task.cancellation = CancellationToken::new();
        }
        task.handle = Some(spawn_loop(
            self.store.clone(),
            self.interval,
            task.cancellation.clone(),
        ));
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Restart the task if it died, then report whether the registry is healthy.
    ///
    /// Returns false when active sessions exceed `max_active` by more than 10%.
    pub fn health_check(&self) -> bool {
        {
            let mut task = self.task.lock();
            let died = task.handle.as_ref().is_some_and(JoinHandle::is_finished);
            if died && !task.cancellation.is_cancelled() {
                warn!("session reaper stopped unexpectedly; restarting");
                task.handle = Some(spawn_loop(
                    self.store.clone(),
                    self.interval,
                    task.cancellation.clone(),
                ));
            }
        }

        let active = self.store.active_count();
        let max_active = self.store.settings().max_active;
        let healthy = active as f64 <= max_active as f64 * HEALTH_OVERCOMMIT;
        if !healthy {
            warn!(
                "active sessions over capacity (active={}, max_active={})",
                active, max_active
            );
        }
        healthy
    }

    /// Stop the task, wait for it to exit and drop every session.
    pub async fn shutdown(&self) {
        let handle = {
            let mut task = self.task.lock();
            task.cancellation.cancel();
            task.handle.take()
        };
        if let Some(handle) = handle
            && let Err(err) = handle.await
            && !err.is_cancelled()
        {
            error!("session reaper exited abnormally: {}", err);
        }
        self.store.clear();
        info!("session reaper shut down");
    }
}

fn spawn_loop(
    store: SessionStore,
    period: Duration,
    cancellation: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        // First purge happens one full period after start.
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            "session reaper started (interval_ms={})",
            period.as_millis()
        );
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => break,
                _ = ticker.tick() => {
                    match std::panic::catch_unwind(AssertUnwindSafe(|| store.cleanup_expired())) {
                        Ok(0) => debug!("reaper tick removed no sessions"),
                        Ok(removed) => info!("reaper removed expired sessions (count={})", removed),
                        Err(_) => error!("reaper tick panicked; continuing"),
                    }
                }
            }
        }
        info!("session reaper stopped");
    })
}
