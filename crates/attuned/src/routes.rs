//! API routes for attuned
//!
//! All bodies are JSON with camelCase fields. Errors are
//! `{"error": "..."}` with a 4xx/5xx status.

use crate::server::AppState;
use attune_shared::{
    adaptive_tokens, AdaptationMode, AdaptiveTokens, AttuneError, BudgetState, CognitiveDomain,
    CognitiveSignal, CognitiveState, CognitiveStateResult, DispatchRequest, DispatchResponse,
    LedgerSummary, NotificationRecord, ResolvedPreferences, Suggestion, UserPreferences, VERSION,
};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

type AppStateArc = Arc<AppState>;

/// Error body for every failed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn bad_request(msg: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody { error: msg.into() }),
    )
}

fn api_error(e: AttuneError) -> ApiError {
    let status = match &e {
        AttuneError::InvalidRequest(_) | AttuneError::Session(_) => StatusCode::BAD_REQUEST,
        AttuneError::GatewayUnavailable(_) | AttuneError::Store(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    };
    if status.is_server_error() {
        error!("  Request failed ({}): {}", e.code(), e);
    }
    (status, Json(ErrorBody { error: e.to_string() }))
}

fn parse_domain(raw: Option<&str>) -> Result<CognitiveDomain, ApiError> {
    let raw = raw.ok_or_else(|| bad_request("domain is required"))?;
    CognitiveDomain::parse(raw).ok_or_else(|| bad_request(format!("Unknown domain '{}'", raw)))
}

// ============================================================================
// Health Routes
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub active_sessions: usize,
}

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/health", get(health_check))
}

async fn health_check(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: VERSION.to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        active_sessions: state.sessions.active_count().await,
    })
}

// ============================================================================
// Signal Routes
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalBatch {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub signals: Vec<CognitiveSignal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalAck {
    pub accepted: usize,
    pub ignored: usize,
}

pub fn signal_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/signals", post(ingest_signals))
}

async fn ingest_signals(
    State(state): State<AppStateArc>,
    payload: Result<Json<SignalBatch>, JsonRejection>,
) -> Result<Json<SignalAck>, ApiError> {
    let Json(batch) = payload.map_err(|e| bad_request(e.body_text()))?;
    let user_id = batch
        .user_id
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| bad_request("userId is required"))?;

    let total = batch.signals.len();
    let known: Vec<CognitiveSignal> = batch
        .signals
        .into_iter()
        .filter(|s| s.signal_type.is_known() && s.value.is_finite())
        .collect();
    let ignored = total - known.len();
    if ignored > 0 {
        warn!("  Ignoring {} malformed signals for {}", ignored, user_id);
    }

    let accepted = state
        .engine
        .stores()
        .signals
        .append_signals(&user_id, known)
        .await
        .map_err(api_error)?;

    Ok(Json(SignalAck { accepted, ignored }))
}

// ============================================================================
// State Routes
// ============================================================================

pub fn state_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/users/:user_id/state", get(evaluate_state))
}

async fn evaluate_state(
    State(state): State<AppStateArc>,
    Path(user_id): Path<String>,
) -> Json<CognitiveStateResult> {
    Json(state.engine.evaluate_state(&user_id).await)
}

// ============================================================================
// Budget Routes
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRequest {
    #[serde(default)]
    pub domain: Option<String>,
    pub cost: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuggestionQuery {
    pub domain: Option<String>,
}

pub fn budget_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/users/:user_id/activity", post(log_activity))
        .route("/v1/users/:user_id/budget", get(get_budget))
        .route("/v1/users/:user_id/budget/suggestion", get(get_suggestion))
        .route("/v1/users/:user_id/ledger", get(get_ledger_summary))
}

async fn log_activity(
    State(state): State<AppStateArc>,
    Path(user_id): Path<String>,
    payload: Result<Json<ActivityRequest>, JsonRejection>,
) -> Result<Json<BudgetState>, ApiError> {
    let Json(req) = payload.map_err(|e| bad_request(e.body_text()))?;
    let domain = parse_domain(req.domain.as_deref())?;
    let budget = state
        .engine
        .log_activity(&user_id, domain, req.cost)
        .await
        .map_err(api_error)?;
    Ok(Json(budget))
}

async fn get_budget(
    State(state): State<AppStateArc>,
    Path(user_id): Path<String>,
) -> Result<Json<BudgetState>, ApiError> {
    let budget = state
        .engine
        .get_budget_state(&user_id)
        .await
        .map_err(api_error)?;
    Ok(Json(budget))
}

async fn get_suggestion(
    State(state): State<AppStateArc>,
    Path(user_id): Path<String>,
    Query(query): Query<SuggestionQuery>,
) -> Result<Json<Suggestion>, ApiError> {
    let domain = parse_domain(query.domain.as_deref())?;
    let suggestion = state
        .engine
        .get_suggestion(&user_id, domain)
        .await
        .map_err(api_error)?;
    Ok(Json(suggestion))
}

async fn get_ledger_summary(
    State(state): State<AppStateArc>,
    Path(user_id): Path<String>,
) -> Result<Json<LedgerSummary>, ApiError> {
    let summary = state
        .engine
        .ledger_summary(&user_id)
        .await
        .map_err(api_error)?;
    Ok(Json(summary))
}

// ============================================================================
// Token Routes
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct TokenQuery {
    pub state: Option<String>,
    pub mode: Option<String>,
}

pub fn token_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/tokens", get(tokens_for_state))
        .route("/v1/users/:user_id/tokens", get(tokens_for_user))
}

async fn tokens_for_state(Query(query): Query<TokenQuery>) -> Result<Json<AdaptiveTokens>, ApiError> {
    let cognitive_state = match query.state.as_deref() {
        Some(raw) => CognitiveState::parse(raw)
            .ok_or_else(|| bad_request(format!("Unknown state '{}'", raw)))?,
        None => CognitiveState::default(),
    };
    let mode = match query.mode.as_deref() {
        Some(raw) => AdaptationMode::parse(raw)
            .ok_or_else(|| bad_request(format!("Unknown mode '{}'", raw)))?,
        None => AdaptationMode::default(),
    };
    Ok(Json(adaptive_tokens(cognitive_state, mode)))
}

async fn tokens_for_user(
    State(state): State<AppStateArc>,
    Path(user_id): Path<String>,
) -> Json<AdaptiveTokens> {
    Json(state.engine.tokens_for_user(&user_id).await)
}

// ============================================================================
// Preference Routes
// ============================================================================

pub fn preference_routes() -> Router<AppStateArc> {
    Router::new().route(
        "/v1/users/:user_id/preferences",
        put(put_preferences).get(get_preferences),
    )
}

async fn put_preferences(
    State(state): State<AppStateArc>,
    Path(user_id): Path<String>,
    payload: Result<Json<UserPreferences>, JsonRejection>,
) -> Result<Json<ResolvedPreferences>, ApiError> {
    let Json(prefs) = payload.map_err(|e| bad_request(e.body_text()))?;
    state
        .engine
        .stores()
        .preferences
        .put(&user_id, prefs)
        .await
        .map_err(api_error)?;
    info!("  Preferences updated for {}", user_id);
    Ok(Json(state.engine.preferences(&user_id).await))
}

async fn get_preferences(
    State(state): State<AppStateArc>,
    Path(user_id): Path<String>,
) -> Json<ResolvedPreferences> {
    Json(state.engine.preferences(&user_id).await)
}

// ============================================================================
// Notification Routes
// ============================================================================

pub fn notification_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/notifications/dispatch", post(dispatch_notification))
        .route("/v1/users/:user_id/notifications", get(list_notifications))
        .route("/v1/users/:user_id/digest", get(digest))
}

async fn dispatch_notification(
    State(state): State<AppStateArc>,
    payload: Result<Json<DispatchRequest>, JsonRejection>,
) -> Result<Json<DispatchResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| bad_request(e.body_text()))?;
    let request = req.validate().map_err(api_error)?;
    let response = state
        .dispatcher
        .dispatch(request)
        .await
        .map_err(api_error)?;
    Ok(Json(response))
}

async fn list_notifications(
    State(state): State<AppStateArc>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<NotificationRecord>>, ApiError> {
    let records = state
        .engine
        .stores()
        .notifications
        .list(&user_id)
        .await
        .map_err(api_error)?;
    Ok(Json(records))
}

async fn digest(
    State(state): State<AppStateArc>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<NotificationRecord>>, ApiError> {
    let records = state.dispatcher.digest(&user_id).await.map_err(api_error)?;
    Ok(Json(records))
}

// ============================================================================
// Session Routes
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user_id: String,
    pub active: bool,
    /// False when the request did not change anything
    pub changed: bool,
}

pub fn session_routes() -> Router<AppStateArc> {
    Router::new().route(
        "/v1/sessions/:user_id",
        post(start_session).delete(stop_session),
    )
}

async fn start_session(
    State(state): State<AppStateArc>,
    Path(user_id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let changed = state.sessions.start(&user_id).await.map_err(api_error)?;
    Ok(Json(SessionResponse {
        user_id,
        active: true,
        changed,
    }))
}

async fn stop_session(
    State(state): State<AppStateArc>,
    Path(user_id): Path<String>,
) -> Json<SessionResponse> {
    let changed = state.sessions.stop(&user_id).await;
    Json(SessionResponse {
        user_id,
        active: false,
        changed,
    })
}
