//! Cognitive engine - per-user evaluation on top of the stores
//!
//! Wires the pure core in attune-shared to the external collaborators:
//! signals in, state history out, ledger reads and appends, preference
//! resolution. Store failures never reach callers of the evaluation path;
//! they degrade to "state unknown" (neutral, confidence 0) with a warning.

use attune_shared::aggregate::{window_start, SIGNAL_WINDOW_MINUTES};
use attune_shared::{
    adaptive_tokens, aggregate, budget_state, evaluate, suggestion, AdaptiveTokens, AttuneError,
    Baseline, BudgetEntry, BudgetPolicy, BudgetState, CognitiveDomain, CognitiveStateResult,
    LedgerSummary, PreferenceDefaults, ResolvedPreferences, RoutingContext, StateRecord, Suggestion,
    UserPreferences, DAILY_CAPACITY,
};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::store::Stores;

/// How far back history is read when building a baseline
pub const BASELINE_LOOKBACK_DAYS: i64 = 7;

/// Raw signals older than this are pruned; aggregation reads 30 minutes
pub const SIGNAL_RETENTION_HOURS: i64 = 24;

/// Cognitive engine service
pub struct CognitiveEngine {
    stores: Stores,
    policy: BudgetPolicy,
    defaults: PreferenceDefaults,
}

impl CognitiveEngine {
    pub fn new(stores: Stores, policy: BudgetPolicy, defaults: PreferenceDefaults) -> Self {
        Self {
            stores,
            policy,
            defaults,
        }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    /// Run one evaluation cycle and persist its result.
    pub async fn evaluate_state(&self, user_id: &str) -> CognitiveStateResult {
        self.evaluate_state_at(user_id, Utc::now()).await
    }

    pub async fn evaluate_state_at(&self, user_id: &str, now: DateTime<Utc>) -> CognitiveStateResult {
        let signals = match self.stores.signals.fetch_signals(user_id, window_start(now)).await {
            Ok(signals) => signals,
            Err(e) => {
                warn!("  Signal fetch failed for {}: {}", user_id, e);
                Vec::new()
            }
        };

        let aggregation = aggregate(&signals, now);
        let baseline = self.baseline(user_id, now).await;
        let budget = self.budget_remaining(user_id, now).await;
        let result = evaluate(&aggregation, baseline.as_ref(), budget);

        debug!(
            "  {} -> {} (confidence {:.2}, baselined: {})",
            user_id,
            result.state,
            result.confidence,
            baseline.is_some()
        );

        let record = StateRecord {
            result: result.clone(),
            features: aggregation.features().cloned().unwrap_or_default(),
            evaluated_at: now,
        };
        if let Err(e) = self.stores.history.append_state_result(user_id, record).await {
            warn!("  State history append failed for {}: {}", user_id, e);
        }

        result
    }

    /// Latest state if it is still inside the signal window, else a fresh evaluation.
    pub async fn current_state_at(&self, user_id: &str, now: DateTime<Utc>) -> CognitiveStateResult {
        match self.stores.history.latest(user_id).await {
            Ok(Some(record))
                if now - record.evaluated_at <= Duration::minutes(SIGNAL_WINDOW_MINUTES) =>
            {
                record.result
            }
            Ok(_) => self.evaluate_state_at(user_id, now).await,
            Err(e) => {
                warn!("  State history read failed for {}: {}", user_id, e);
                CognitiveStateResult::insufficient_data(DAILY_CAPACITY)
            }
        }
    }

    /// Drop signals and history rows no read window can reach any more.
    /// Returns how many rows went.
    pub async fn prune_expired(&self, user_id: &str, now: DateTime<Utc>) -> usize {
        let mut pruned = 0;
        match self
            .stores
            .signals
            .prune_before(user_id, now - Duration::hours(SIGNAL_RETENTION_HOURS))
            .await
        {
            Ok(n) => pruned += n,
            Err(e) => warn!("  Signal prune failed for {}: {}", user_id, e),
        }
        match self
            .stores
            .history
            .prune_before(user_id, now - Duration::days(BASELINE_LOOKBACK_DAYS))
            .await
        {
            Ok(n) => pruned += n,
            Err(e) => warn!("  History prune failed for {}: {}", user_id, e),
        }
        if pruned > 0 {
            debug!("  Pruned {} expired rows for {}", pruned, user_id);
        }
        pruned
    }

    async fn baseline(&self, user_id: &str, now: DateTime<Utc>) -> Option<Baseline> {
        let since = now - Duration::days(BASELINE_LOOKBACK_DAYS);
        match self.stores.history.records_since(user_id, since).await {
            Ok(records) => Baseline::from_records(&records, now),
            Err(e) => {
                warn!("  Baseline unavailable for {}: {}", user_id, e);
                None
            }
        }
    }

    async fn budget_remaining(&self, user_id: &str, now: DateTime<Utc>) -> f64 {
        match self.budget_state_at(user_id, now).await {
            Ok(budget) => budget.total.remaining,
            Err(e) => {
                warn!("  Budget unavailable for {}: {}", user_id, e);
                DAILY_CAPACITY
            }
        }
    }

    // ------------------------------------------------------------------
    // Budget
    // ------------------------------------------------------------------

    /// Append a clamped entry and return the recomputed budget.
    pub async fn log_activity(
        &self,
        user_id: &str,
        domain: CognitiveDomain,
        cost: f64,
    ) -> Result<BudgetState, AttuneError> {
        let now = Utc::now();
        let entry = BudgetEntry::new(domain, cost, now);
        if entry.was_clamped() || !cost.is_finite() {
            warn!(
                "  Activity cost {} for {} clamped to {}",
                cost, user_id, entry.energy_cost
            );
        }
        self.stores.ledger.append(user_id, entry).await?;
        info!("  Logged {} activity for {}", domain, user_id);
        self.budget_state_at(user_id, now).await
    }

    pub async fn get_budget_state(&self, user_id: &str) -> Result<BudgetState, AttuneError> {
        self.budget_state_at(user_id, Utc::now()).await
    }

    pub async fn budget_state_at(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<BudgetState, AttuneError> {
        let since = now - Duration::hours(self.policy.window_hours);
        let entries = self.stores.ledger.entries_since(user_id, since).await?;
        Ok(budget_state(&entries, now, &self.policy))
    }

    /// Audit counters over the user's whole ledger.
    pub async fn ledger_summary(&self, user_id: &str) -> Result<LedgerSummary, AttuneError> {
        self.stores.ledger.summary(user_id).await
    }

    /// Suggestion under the user's current state.
    pub async fn get_suggestion(
        &self,
        user_id: &str,
        domain: CognitiveDomain,
    ) -> Result<Suggestion, AttuneError> {
        let now = Utc::now();
        let budget = self.budget_state_at(user_id, now).await?;
        let state = self.current_state_at(user_id, now).await.state;
        Ok(suggestion(&budget, domain, state, &self.policy))
    }

    // ------------------------------------------------------------------
    // Preferences and derived views
    // ------------------------------------------------------------------

    /// Stored preferences with every gap filled from the defaults.
    pub async fn preferences(&self, user_id: &str) -> ResolvedPreferences {
        let stored = match self.stores.preferences.get(user_id).await {
            Ok(prefs) => prefs.unwrap_or_default(),
            Err(e) => {
                warn!("  Preferences unavailable for {}, using defaults: {}", user_id, e);
                UserPreferences::default()
            }
        };
        stored.resolve(&self.defaults)
    }

    /// Tokens for the user's current state under their adaptation mode.
    pub async fn tokens_for_user(&self, user_id: &str) -> AdaptiveTokens {
        let state = self.current_state_at(user_id, Utc::now()).await.state;
        let mode = self.preferences(user_id).await.adaptation_mode;
        adaptive_tokens(state, mode)
    }

    /// Everything the router needs besides priority.
    pub async fn routing_context(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        current_hour: u32,
    ) -> RoutingContext {
        let state = self.current_state_at(user_id, now).await.state;
        let prefs = self.preferences(user_id).await;
        RoutingContext {
            state,
            quiet_hours: Some(prefs.quiet_hours),
            alert_frequency: prefs.alert_frequency,
            has_push_subscription: prefs.has_push_subscription,
            current_hour,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attune_shared::inference::UNBASELINED_CEILING;
    use attune_shared::{
        AggregatedFeatures, CognitiveSignal, CognitiveState, FeatureSet, SignalType,
    };

    fn engine() -> CognitiveEngine {
        CognitiveEngine::new(
            Stores::in_memory(),
            BudgetPolicy::default(),
            PreferenceDefaults::default(),
        )
    }

    #[tokio::test]
    async fn test_sparse_window_is_neutral_and_recorded() {
        let engine = engine();
        let now = Utc::now();
        let result = engine.evaluate_state_at("u1", now).await;
        assert_eq!(result.state, CognitiveState::Neutral);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.cognitive_budget, DAILY_CAPACITY);

        let latest = engine.stores().history.latest("u1").await.unwrap().unwrap();
        assert_eq!(latest.evaluated_at, now);
        assert!(latest.features.is_empty());
    }

    #[tokio::test]
    async fn test_budget_feeds_result() {
        let engine = engine();
        engine
            .log_activity("u1", CognitiveDomain::Work, 0.3)
            .await
            .unwrap();
        let result = engine.evaluate_state("u1").await;
        assert!((result.cognitive_budget - 0.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_log_activity_clamps_and_records() {
        let engine = engine();
        let budget = engine
            .log_activity("u1", CognitiveDomain::Admin, 3.0)
            .await
            .unwrap();
        assert_eq!(budget.total.remaining, 0.0);
        let summary = engine.ledger_summary("u1").await.unwrap();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.clamped, 1);
    }

    #[tokio::test]
    async fn test_current_state_reuses_recent_record() {
        let engine = engine();
        let now = Utc::now();
        let signals: Vec<CognitiveSignal> = (0..6)
            .map(|i| {
                CognitiveSignal::new(
                    SignalType::TaskSwitchRate,
                    8.0,
                    now - Duration::minutes(10 - i),
                )
            })
            .collect();
        engine.stores().signals.append_signals("u1", signals).await.unwrap();

        let first = engine.evaluate_state_at("u1", now).await;
        let again = engine.current_state_at("u1", now + Duration::minutes(1)).await;
        assert_eq!(first, again);
        assert_eq!(
            engine
                .stores()
                .history
                .records_since("u1", now - Duration::hours(1))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_routing_context_uses_preferences() {
        let engine = engine();
        let ctx = engine.routing_context("u1", Utc::now(), 12).await;
        assert!(!ctx.has_push_subscription);
        assert_eq!(ctx.quiet_hours, Some(PreferenceDefaults::default().quiet_hours));

        engine
            .stores()
            .preferences
            .put(
                "u1",
                UserPreferences {
                    has_push_subscription: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let ctx = engine.routing_context("u1", Utc::now(), 12).await;
        assert!(ctx.has_push_subscription);
        assert_eq!(ctx.current_hour, 12);
    }

    /// Six readings of each type matching the flow prototype
    async fn seed_flow_window(engine: &CognitiveEngine, user: &str, now: DateTime<Utc>) {
        let mut signals = Vec::new();
        for i in 0..6 {
            let at = now - Duration::minutes(20 - i);
            signals.push(CognitiveSignal::new(SignalType::TypingCadence, 260.0, at));
            signals.push(CognitiveSignal::new(SignalType::TaskSwitchRate, 1.0, at));
            signals.push(CognitiveSignal::new(SignalType::ErrorRate, 0.1, at));
        }
        engine.stores().signals.append_signals(user, signals).await.unwrap();
    }

    /// Prior-day row whose habits sit on the neutral reference
    fn neutral_history_row(evaluated_at: DateTime<Utc>) -> StateRecord {
        let feature = |mean_value: f64| AggregatedFeatures {
            mean_value,
            variance: 0.0,
            rate_of_change: 0.0,
            sample_count: 6,
        };
        StateRecord {
            result: CognitiveStateResult::insufficient_data(DAILY_CAPACITY),
            features: FeatureSet {
                features: [
                    (SignalType::TypingCadence, feature(0.40)),
                    (SignalType::TaskSwitchRate, feature(0.30)),
                    (SignalType::ErrorRate, feature(0.20)),
                ]
                .into_iter()
                .collect(),
                sample_count: 18,
            },
            evaluated_at,
        }
    }

    #[tokio::test]
    async fn test_prior_days_raise_confidence() {
        let engine = engine();
        let now = Utc::now();
        seed_flow_window(&engine, "fresh", now).await;
        seed_flow_window(&engine, "habitual", now).await;
        for days in 1..=3 {
            engine
                .stores()
                .history
                .append_state_result("habitual", neutral_history_row(now - Duration::days(days)))
                .await
                .unwrap();
        }

        let fresh = engine.evaluate_state_at("fresh", now).await;
        let habitual = engine.evaluate_state_at("habitual", now).await;
        assert_eq!(fresh.state, CognitiveState::Flow);
        assert_eq!(habitual.state, CognitiveState::Flow);
        assert!(fresh.confidence <= UNBASELINED_CEILING);
        assert!(habitual.confidence > fresh.confidence);
    }

    #[tokio::test]
    async fn test_two_prior_days_stay_unbaselined() {
        let engine = engine();
        let now = Utc::now();
        seed_flow_window(&engine, "fresh", now).await;
        seed_flow_window(&engine, "newcomer", now).await;
        for days in 1..=2 {
            engine
                .stores()
                .history
                .append_state_result("newcomer", neutral_history_row(now - Duration::days(days)))
                .await
                .unwrap();
        }

        let fresh = engine.evaluate_state_at("fresh", now).await;
        let newcomer = engine.evaluate_state_at("newcomer", now).await;
        assert_eq!(fresh.confidence, newcomer.confidence);
    }

    #[tokio::test]
    async fn test_prune_expired_keeps_live_rows() {
        let engine = engine();
        let now = Utc::now();
        seed_flow_window(&engine, "u1", now).await;
        engine
            .stores()
            .signals
            .append_signals(
                "u1",
                vec![CognitiveSignal::new(
                    SignalType::ErrorRate,
                    0.3,
                    now - Duration::hours(SIGNAL_RETENTION_HOURS + 1),
                )],
            )
            .await
            .unwrap();
        for days in [BASELINE_LOOKBACK_DAYS + 1, 1] {
            engine
                .stores()
                .history
                .append_state_result("u1", neutral_history_row(now - Duration::days(days)))
                .await
                .unwrap();
        }

        assert_eq!(engine.prune_expired("u1", now).await, 2);
        assert_eq!(engine.prune_expired("u1", now).await, 0);
        let result = engine.evaluate_state_at("u1", now).await;
        assert_eq!(result.state, CognitiveState::Flow);
    }
}
