//! Session store and reaper integration tests.

use pretty_assertions::assert_eq;
use relay_rs_core::{Reaper, SessionSettings, SessionStore};
use relay_rs_protocol::Message;
use std::collections::HashSet;
use std::time::Duration;

fn store(timeout: Duration, max_active: usize) -> SessionStore {
    SessionStore::new(SessionSettings {
        timeout,
        max_active,
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_converge_on_one_session() {
    let sessions = store(Duration::from_secs(60), 10);
    let mut handles = Vec::new();
    for _ in 0..16 {
        let sessions = sessions.clone();
        handles.push(tokio::spawn(async move {
            sessions.create(Some("shared")).created_at
        }));
    }

    let mut created = HashSet::new();
    for handle in handles {
        created.insert(handle.await.expect("join"));
    }

    assert_eq!(created.len(), 1);
    assert_eq!(sessions.stats().total, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_are_all_kept() {
    let sessions = store(Duration::from_secs(60), 10);
    let id = sessions.create(None).id;
    let mut handles = Vec::new();
    for n in 0..20 {
        let sessions = sessions.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            sessions.append_message(&id, Message::user(format!("m{n}")))
        }));
    }
    for handle in handles {
        assert!(handle.await.expect("join"));
    }

    assert_eq!(sessions.messages(&id, None).len(), 20);
}

#[tokio::test]
async fn active_sessions_never_exceed_capacity() {
    let sessions = store(Duration::from_secs(60), 3);
    for n in 0..10 {
        sessions.create(Some(&format!("s{n}")));
        assert!(sessions.active_count() <= 3);
    }
    let stats = sessions.stats();
    assert_eq!(stats.active, 3);
    assert_eq!(stats.max_active, 3);
    assert!(sessions.get("s9").is_some());
    assert!(sessions.get("s0").is_none());
}

#[tokio::test]
async fn reaper_purges_expired_sessions() {
    let sessions = store(Duration::from_millis(30), 10);
    sessions.create(Some("short-lived"));
    let reaper = Reaper::new(sessions.clone(), Duration::from_millis(20));
    reaper.start();

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(sessions.stats().total, 0);
    assert!(reaper.is_running());
    reaper.shutdown().await;
    assert!(!reaper.is_running());
}

#[tokio::test]
async fn reaper_shutdown_clears_the_registry() {
    let sessions = store(Duration::from_secs(60), 10);
    sessions.create(Some("a"));
    sessions.create(Some("b"));
    let reaper = Reaper::new(sessions.clone(), Duration::from_secs(60));
    reaper.start();
    assert!(reaper.health_check());

    reaper.shutdown().await;

    assert_eq!(sessions.stats().total, 0);
}
