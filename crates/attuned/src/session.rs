//! Per-user sessions and their periodic loops
//!
//! Each active session owns two tasks:
//! - state loop: evaluate the user's state, then re-route deferred notifications
//! - budget loop: recompute the budget, surface recommendations in the log
//!   and prune signals and history that no read window reaches
//!
//! Both loops stop on the session's watch channel. A tick that is already
//! running completes before the loop observes shutdown, so a routing decision
//! is never left half-applied.

use std::collections::HashMap;
use std::sync::Arc;

use attune_shared::AttuneError;
use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::config::EvaluationConfig;
use crate::dispatch::Dispatcher;
use crate::engine::CognitiveEngine;

struct Session {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    started_at: DateTime<Utc>,
}

/// Starts, tracks and stops evaluation loops
pub struct SessionManager {
    engine: Arc<CognitiveEngine>,
    dispatcher: Arc<Dispatcher>,
    config: EvaluationConfig,
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionManager {
    pub fn new(
        engine: Arc<CognitiveEngine>,
        dispatcher: Arc<Dispatcher>,
        config: EvaluationConfig,
    ) -> Self {
        Self {
            engine,
            dispatcher,
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Start loops for a user. Returns false if the session already runs.
    pub async fn start(&self, user_id: &str) -> Result<bool, AttuneError> {
        if user_id.trim().is_empty() {
            return Err(AttuneError::Session("userId is required".to_string()));
        }

        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(user_id) {
            debug!("  Session for {} already active", user_id);
            return Ok(false);
        }

        let (tx, rx) = watch::channel(false);
        let tasks = vec![
            self.spawn_state_loop(user_id.to_string(), rx.clone()),
            self.spawn_budget_loop(user_id.to_string(), rx),
        ];
        sessions.insert(
            user_id.to_string(),
            Session {
                shutdown: tx,
                tasks,
                started_at: Utc::now(),
            },
        );

        info!(
            "  Session started for {} (state every {}s, budget every {}s)",
            user_id, self.config.state_interval_secs, self.config.budget_interval_secs
        );
        Ok(true)
    }

    /// Stop a user's loops and wait for them. Returns false if none ran.
    pub async fn stop(&self, user_id: &str) -> bool {
        let session = self.sessions.lock().await.remove(user_id);
        let Some(session) = session else {
            return false;
        };
        let lifetime = Utc::now() - session.started_at;
        Self::join(user_id, session).await;
        info!(
            "  Session stopped for {} after {}s",
            user_id,
            lifetime.num_seconds()
        );
        true
    }

    /// Stop every session; used on daemon exit.
    pub async fn shutdown_all(&self) {
        let drained: Vec<(String, Session)> = self.sessions.lock().await.drain().collect();
        let count = drained.len();
        for (user_id, session) in drained {
            Self::join(&user_id, session).await;
        }
        if count > 0 {
            info!("  Stopped {} sessions", count);
        }
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_active(&self, user_id: &str) -> bool {
        self.sessions.lock().await.contains_key(user_id)
    }

    async fn join(user_id: &str, session: Session) {
        // Receivers may already be gone if a loop panicked
        let _ = session.shutdown.send(true);
        for task in session.tasks {
            if let Err(e) = task.await {
                warn!("  Session task for {} ended abnormally: {}", user_id, e);
            }
        }
    }

    fn spawn_state_loop(&self, user_id: String, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        let dispatcher = Arc::clone(&self.dispatcher);
        let period = Duration::from_secs(self.config.state_interval_secs.max(1));

        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let result = engine.evaluate_state(&user_id).await;
                        debug!("  [{}] state {} ({:.2})", user_id, result.state, result.confidence);
                        if let Err(e) = dispatcher.flush_deferred(&user_id).await {
                            warn!("  [{}] deferred flush failed: {}", user_id, e);
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
            debug!("  [{}] state loop exited", user_id);
        })
    }

    fn spawn_budget_loop(&self, user_id: String, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        let period = Duration::from_secs(self.config.budget_interval_secs.max(1));

        tokio::spawn(async move {
            let mut ticker = interval(period);
            let mut last: Vec<String> = Vec::new();
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match engine.get_budget_state(&user_id).await {
                            Ok(budget) => {
                                if budget.recommendations != last {
                                    for rec in &budget.recommendations {
                                        info!("  [{}] {}", user_id, rec);
                                    }
                                    last = budget.recommendations;
                                }
                            }
                            Err(e) => warn!("  [{}] budget recompute failed: {}", user_id, e),
                        }
                        engine.prune_expired(&user_id, Utc::now()).await;
                    }
                    _ = shutdown.changed() => break,
                }
            }
            debug!("  [{}] budget loop exited", user_id);
        })
    }
}
