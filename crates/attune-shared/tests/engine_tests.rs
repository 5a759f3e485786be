//! Scenario tests across aggregation, inference, budget, tokens and routing.

use attune_shared::{
    aggregate, budget_state, evaluate, route_notification, suggestion, AlertFrequency,
    BudgetEntry, BudgetPolicy, CognitiveDomain, CognitiveSignal, CognitiveState, Modality,
    NotificationRequest, Priority, QuietHours, RoutingContext, RoutingRule, SignalType,
};
use chrono::{Duration, Utc};

fn context(state: CognitiveState, hour: u32, push: bool) -> RoutingContext {
    RoutingContext {
        state,
        quiet_hours: Some(QuietHours::new(22, 7)),
        alert_frequency: AlertFrequency::All,
        has_push_subscription: push,
        current_hour: hour,
    }
}

// ============================================================================
// Inference scenarios
// ============================================================================

#[test]
fn test_distracted_from_raw_signals() {
    let now = Utc::now();
    let mut signals = Vec::new();
    for i in 0..5 {
        signals.push(CognitiveSignal::new(
            SignalType::TaskSwitchRate,
            8.0,
            now - Duration::minutes(2 * i + 1),
        ));
        let idle = if i % 2 == 0 { 30.0 } else { 540.0 };
        signals.push(CognitiveSignal::new(
            SignalType::IdleDuration,
            idle,
            now - Duration::minutes(2 * i),
        ));
    }

    let aggregation = aggregate(&signals, now);
    let result = evaluate(&aggregation, None, 1.0);

    assert_eq!(result.state, CognitiveState::Distracted);
    assert!(
        result.confidence >= 0.4 && result.confidence <= 0.7,
        "confidence {} outside expected band",
        result.confidence
    );
}

#[test]
fn test_four_samples_is_neutral_zero() {
    let now = Utc::now();
    let signals: Vec<_> = (0..4)
        .map(|i| CognitiveSignal::new(SignalType::ErrorRate, 0.9, now - Duration::minutes(i)))
        .collect();
    let result = evaluate(&aggregate(&signals, now), None, 1.0);
    assert_eq!(result.state, CognitiveState::Neutral);
    assert_eq!(result.confidence, 0.0);
}

#[test]
fn test_out_of_range_values_are_clamped_not_fatal() {
    let now = Utc::now();
    let signals: Vec<_> = (0..6)
        .map(|i| CognitiveSignal::new(SignalType::ErrorRate, 50.0, now - Duration::minutes(i)))
        .collect();
    let result = evaluate(&aggregate(&signals, now), None, 1.0);
    assert!(result.stress_index <= 1.0);
    assert!(result.confidence > 0.0);
}

// ============================================================================
// Budget scenarios
// ============================================================================

#[test]
fn test_two_heavy_work_entries() {
    let now = Utc::now();
    let entries = vec![
        BudgetEntry::new(CognitiveDomain::Work, 0.9, now - Duration::minutes(10)),
        BudgetEntry::new(CognitiveDomain::Work, 0.9, now - Duration::minutes(5)),
    ];
    let before = budget_state(&[], now, &BudgetPolicy::default());
    let after = budget_state(&entries, now, &BudgetPolicy::default());

    let reduction = before.domain_remaining(CognitiveDomain::Work)
        - after.domain_remaining(CognitiveDomain::Work);
    assert!(reduction <= 1.0);
    assert_eq!(after.domain_remaining(CognitiveDomain::Work), 0.0);
    assert!((after.total.spent - 1.8).abs() < 1e-9);
    assert_eq!(after.total.remaining, 0.0);
}

#[test]
fn test_exhausted_domain_does_not_block_other_domain() {
    let now = Utc::now();
    let entries = vec![BudgetEntry::new(CognitiveDomain::Work, 1.0, now)];
    let state = budget_state(&entries, now, &BudgetPolicy::default());

    let creative = suggestion(
        &state,
        CognitiveDomain::Creative,
        CognitiveState::Neutral,
        &BudgetPolicy::default(),
    );
    assert!(creative.proceed);

    let work = suggestion(
        &state,
        CognitiveDomain::Work,
        CognitiveState::Neutral,
        &BudgetPolicy::default(),
    );
    assert!(!work.proceed);
    assert!(work.reason.is_some());
}

#[test]
fn test_low_domain_with_healthy_total_proceeds() {
    let now = Utc::now();
    let entries = vec![BudgetEntry::new(CognitiveDomain::Social, 0.2, now)];
    let mut state = budget_state(&entries, now, &BudgetPolicy::default());
    // Force a low domain with a healthy total.
    state.per_domain.insert(CognitiveDomain::Social, 0.05);
    let s = suggestion(
        &state,
        CognitiveDomain::Social,
        CognitiveState::Neutral,
        &BudgetPolicy::default(),
    );
    assert!(s.proceed);
}

// ============================================================================
// Routing scenarios
// ============================================================================

#[test]
fn test_high_priority_in_flow_is_batched() {
    let request = NotificationRequest::new("u1", "Review ready", "PR #12", Priority::High);
    let decision = route_notification(&request, &context(CognitiveState::Flow, 11, true));
    assert_eq!(decision.modality, Modality::Batch);
    assert_eq!(decision.rule, RoutingRule::DeepFocus);
}

#[test]
fn test_normal_at_23_is_batched() {
    let request = NotificationRequest::new("u1", "Weekly digest", "", Priority::Normal);
    let decision = route_notification(&request, &context(CognitiveState::Neutral, 23, false));
    assert_eq!(decision.modality, Modality::Batch);
    assert_eq!(decision.rule, RoutingRule::QuietHours);
}

#[test]
fn test_critical_during_overload_without_push_is_in_app() {
    let request = NotificationRequest::new("u1", "Server down", "", Priority::Critical);
    let decision = route_notification(&request, &context(CognitiveState::Overload, 12, false));
    assert_eq!(decision.modality, Modality::InApp);
    assert_eq!(decision.rule, RoutingRule::Overload);
}
