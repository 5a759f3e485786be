//! Session lifecycle tests: loops run on start and stop on teardown

use attune_shared::{BudgetPolicy, CognitiveSignal, CognitiveState, PreferenceDefaults, SignalType};
use attuned::config::EvaluationConfig;
use attuned::engine::SIGNAL_RETENTION_HOURS;
use attuned::{CognitiveEngine, Dispatcher, FakeDeliveryGateway, SessionManager, Stores};
use chrono::{Duration, Utc};
use std::sync::Arc;

fn setup() -> (Arc<CognitiveEngine>, SessionManager) {
    let engine = Arc::new(CognitiveEngine::new(
        Stores::in_memory(),
        BudgetPolicy::default(),
        PreferenceDefaults::default(),
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&engine),
        Arc::new(FakeDeliveryGateway::new()),
    ));
    let sessions = SessionManager::new(
        Arc::clone(&engine),
        dispatcher,
        EvaluationConfig {
            state_interval_secs: 1,
            budget_interval_secs: 1,
        },
    );
    (engine, sessions)
}

async fn history_len(engine: &CognitiveEngine, user: &str) -> usize {
    engine
        .stores()
        .history
        .records_since(user, Utc::now() - Duration::hours(1))
        .await
        .unwrap()
        .len()
}

#[tokio::test]
async fn test_session_evaluates_immediately() {
    let (engine, sessions) = setup();
    sessions.start("u1").await.unwrap();

    // First interval tick fires right away
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let latest = engine.stores().history.latest("u1").await.unwrap();
    assert_eq!(latest.map(|r| r.result.state), Some(CognitiveState::Neutral));

    sessions.stop("u1").await;
}

#[tokio::test]
async fn test_no_evaluations_after_stop() {
    let (engine, sessions) = setup();
    sessions.start("u1").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert!(sessions.stop("u1").await);

    let before = history_len(&engine, "u1").await;
    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
    assert_eq!(history_len(&engine, "u1").await, before);
}

#[tokio::test]
async fn test_shutdown_all_stops_everyone() {
    let (_engine, sessions) = setup();
    for user in ["a", "b", "c"] {
        assert!(sessions.start(user).await.unwrap());
    }
    assert_eq!(sessions.active_count().await, 3);

    sessions.shutdown_all().await;
    assert_eq!(sessions.active_count().await, 0);
    assert!(!sessions.stop("a").await);
}

#[tokio::test]
async fn test_restart_after_stop() {
    let (_engine, sessions) = setup();
    assert!(sessions.start("u1").await.unwrap());
    assert!(sessions.stop("u1").await);
    assert!(sessions.start("u1").await.unwrap());
    sessions.shutdown_all().await;
}

#[tokio::test]
async fn test_budget_loop_prunes_old_signals() {
    let (engine, sessions) = setup();
    let now = Utc::now();
    engine
        .stores()
        .signals
        .append_signals(
            "u1",
            vec![
                CognitiveSignal::new(
                    SignalType::ErrorRate,
                    0.2,
                    now - Duration::hours(SIGNAL_RETENTION_HOURS + 2),
                ),
                CognitiveSignal::new(SignalType::ErrorRate, 0.2, now),
            ],
        )
        .await
        .unwrap();

    sessions.start("u1").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    sessions.stop("u1").await;

    let kept = engine
        .stores()
        .signals
        .fetch_signals("u1", now - Duration::days(7))
        .await
        .unwrap();
    assert_eq!(kept.len(), 1);
}
