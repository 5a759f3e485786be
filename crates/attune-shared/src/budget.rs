//! Cognitive budget: pure reduction over ledger entries.
//!
//! `budget_state` is recomputed from the entries inside a trailing wall-clock
//! window on every call. There is no cached counter, so any number of readers
//! can reduce the same entries concurrently.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::{BudgetEntry, CognitiveDomain};
use crate::state::CognitiveState;

/// Normalized daily capacity, shared by the total and every domain.
pub const DAILY_CAPACITY: f64 = 1.0;

/// Rolling window over which entries count.
pub const BUDGET_WINDOW_HOURS: i64 = 24;

/// A domain below this remaining level is considered spent.
pub const DOMAIN_FLOOR: f64 = 0.15;

/// Total remaining below this level calls for winding down.
pub const GLOBAL_FLOOR: f64 = 0.20;

/// Floors are raised by this factor while the user is overloaded or fatigued.
pub const PROTECTIVE_FLOOR_FACTOR: f64 = 1.5;

/// Total remaining below this level earns a break reminder.
const HALF_SPENT: f64 = 0.5;

/// Tunable parts of the budget policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetPolicy {
    pub window_hours: i64,
    pub domain_floor: f64,
    pub global_floor: f64,
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self {
            window_hours: BUDGET_WINDOW_HOURS,
            domain_floor: DOMAIN_FLOOR,
            global_floor: GLOBAL_FLOOR,
        }
    }
}

impl BudgetPolicy {
    /// Floors in effect for a given state.
    pub fn floors_for(&self, state: CognitiveState) -> (f64, f64) {
        let factor = match state {
            CognitiveState::Overload | CognitiveState::Fatigued => PROTECTIVE_FLOOR_FACTOR,
            _ => 1.0,
        };
        (
            (self.domain_floor * factor).min(DAILY_CAPACITY),
            (self.global_floor * factor).min(DAILY_CAPACITY),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalBudget {
    /// Raw sum of costs in the window, may exceed capacity
    pub spent: f64,
    /// Always in [0, capacity]
    pub remaining: f64,
}

/// Derived budget view. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetState {
    pub total: TotalBudget,
    pub per_domain: BTreeMap<CognitiveDomain, f64>,
    pub recommendations: Vec<String>,
}

impl BudgetState {
    pub fn domain_remaining(&self, domain: CognitiveDomain) -> f64 {
        self.per_domain
            .get(&domain)
            .copied()
            .unwrap_or(DAILY_CAPACITY)
    }
}

fn remaining(spent: f64) -> f64 {
    (DAILY_CAPACITY - spent).clamp(0.0, DAILY_CAPACITY)
}

/// Reduce entries inside `(now - window, now]` into a budget view.
pub fn budget_state(entries: &[BudgetEntry], now: DateTime<Utc>, policy: &BudgetPolicy) -> BudgetState {
    let start = now - Duration::hours(policy.window_hours);
    let mut spent_by_domain: BTreeMap<CognitiveDomain, f64> =
        CognitiveDomain::ALL.iter().map(|d| (*d, 0.0)).collect();
    let mut spent = 0.0;

    for entry in entries {
        if entry.timestamp <= start || entry.timestamp > now {
            continue;
        }
        spent += entry.energy_cost;
        *spent_by_domain.entry(entry.domain).or_insert(0.0) += entry.energy_cost;
    }

    let total = TotalBudget {
        spent,
        remaining: remaining(spent),
    };
    let per_domain: BTreeMap<CognitiveDomain, f64> = spent_by_domain
        .iter()
        .map(|(d, s)| (*d, remaining(*s)))
        .collect();
    let recommendations = recommend(&total, &spent_by_domain, &per_domain, policy);

    BudgetState {
        total,
        per_domain,
        recommendations,
    }
}

fn recommend(
    total: &TotalBudget,
    spent_by_domain: &BTreeMap<CognitiveDomain, f64>,
    per_domain: &BTreeMap<CognitiveDomain, f64>,
    policy: &BudgetPolicy,
) -> Vec<String> {
    let mut out = Vec::new();

    if total.spent == 0.0 {
        out.push("Full budget available: a good time for demanding work".to_string());
        return out;
    }

    if total.remaining < policy.global_floor {
        out.push("Daily budget nearly spent: wind down and defer non-urgent tasks".to_string());
    } else if total.remaining < HALF_SPENT {
        out.push("Over half of today's budget used: schedule a break".to_string());
    }

    for (domain, left) in per_domain {
        let touched = spent_by_domain.get(domain).copied().unwrap_or(0.0) > 0.0;
        if touched && *left < policy.domain_floor {
            out.push(format!(
                "{} budget exhausted: move remaining {} tasks to tomorrow",
                capitalize(&domain.to_string()),
                domain
            ));
        }
    }

    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Advice on whether to take on more activity in a domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub proceed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Block only when the domain AND the overall budget are both under their
/// floors, so one exhausted domain never blocks another.
pub fn suggestion(
    budget: &BudgetState,
    domain: CognitiveDomain,
    state: CognitiveState,
    policy: &BudgetPolicy,
) -> Suggestion {
    let (domain_floor, global_floor) = policy.floors_for(state);
    let domain_left = budget.domain_remaining(domain);
    let domain_low = domain_left < domain_floor;
    let total_low = budget.total.remaining < global_floor;

    match (domain_low, total_low) {
        (true, true) => Suggestion {
            proceed: false,
            reason: Some(format!(
                "{} budget ({:.2}) and overall budget ({:.2}) are both below their floors",
                domain, domain_left, budget.total.remaining
            )),
        },
        (true, false) => Suggestion {
            proceed: true,
            reason: Some(format!(
                "{} budget is low ({:.2}), overall budget still allows it",
                domain, domain_left
            )),
        },
        (false, true) => Suggestion {
            proceed: true,
            reason: Some(format!(
                "Overall budget is low ({:.2}), keep {} work light",
                budget.total.remaining, domain
            )),
        },
        (false, false) => Suggestion {
            proceed: true,
            reason: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(domain: CognitiveDomain, cost: f64, hours_ago: i64, now: DateTime<Utc>) -> BudgetEntry {
        BudgetEntry::new(domain, cost, now - Duration::hours(hours_ago))
    }

    #[test]
    fn test_empty_is_full() {
        let state = budget_state(&[], Utc::now(), &BudgetPolicy::default());
        assert_eq!(state.total.remaining, DAILY_CAPACITY);
        assert_eq!(state.per_domain.len(), CognitiveDomain::ALL.len());
        assert_eq!(state.recommendations.len(), 1);
    }

    #[test]
    fn test_window_excludes_old_entries() {
        let now = Utc::now();
        let entries = vec![
            entry(CognitiveDomain::Work, 0.5, 30, now),
            entry(CognitiveDomain::Work, 0.2, 1, now),
        ];
        let state = budget_state(&entries, now, &BudgetPolicy::default());
        assert!((state.total.spent - 0.2).abs() < 1e-9);
        assert!((state.domain_remaining(CognitiveDomain::Work) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_floors_raised_when_overloaded() {
        let policy = BudgetPolicy::default();
        let (d, g) = policy.floors_for(CognitiveState::Overload);
        assert!(d > policy.domain_floor);
        assert!(g > policy.global_floor);
        assert_eq!(policy.floors_for(CognitiveState::Flow), (DOMAIN_FLOOR, GLOBAL_FLOOR));
    }

    #[test]
    fn test_exhausted_domain_recommendation() {
        let now = Utc::now();
        let entries = vec![entry(CognitiveDomain::Social, 0.95, 1, now)];
        let state = budget_state(&entries, now, &BudgetPolicy::default());
        assert!(state
            .recommendations
            .iter()
            .any(|r| r.starts_with("Social budget exhausted")));
        assert!(state
            .recommendations
            .iter()
            .any(|r| r.starts_with("Daily budget nearly spent")));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("work"), "Work");
        assert_eq!(capitalize(""), "");
    }
}
