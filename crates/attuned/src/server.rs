//! HTTP server for attuned

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::engine::CognitiveEngine;
use crate::gateway::DeliveryGateway;
use crate::routes;
use crate::session::SessionManager;
use crate::store::Stores;
use anyhow::Result;
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
pub struct AppState {
    pub engine: Arc<CognitiveEngine>,
    pub dispatcher: Arc<Dispatcher>,
    pub sessions: Arc<SessionManager>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: &Config, stores: Stores, gateway: Arc<dyn DeliveryGateway>) -> Self {
        let engine = Arc::new(CognitiveEngine::new(
            stores,
            config.budget.to_policy(),
            config.defaults.to_preference_defaults(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&engine), gateway));
        let sessions = Arc::new(SessionManager::new(
            Arc::clone(&engine),
            Arc::clone(&dispatcher),
            config.evaluation.clone(),
        ));
        Self {
            engine,
            dispatcher,
            sessions,
            start_time: Instant::now(),
        }
    }
}

/// Build the full router without binding a socket
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::signal_routes())
        .merge(routes::state_routes())
        .merge(routes::budget_routes())
        .merge(routes::token_routes())
        .merge(routes::preference_routes())
        .merge(routes::notification_routes())
        .merge(routes::session_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server until `shutdown` resolves, then stop every session
pub async fn run(
    state: AppState,
    bind_addr: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let state = Arc::new(state);
    let app = router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("  Listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    state.sessions.shutdown_all().await;
    Ok(())
}
