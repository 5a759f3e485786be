//! Append-only cognitive budget ledger.
//!
//! Entries are never mutated or removed once appended. They stop counting
//! toward the remaining budget only because the rolling window in
//! `budget::budget_state` excludes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Life domain an activity draws energy from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CognitiveDomain {
    Work,
    Social,
    Admin,
    Creative,
    Personal,
}

impl CognitiveDomain {
    pub const ALL: [CognitiveDomain; 5] = [
        CognitiveDomain::Work,
        CognitiveDomain::Social,
        CognitiveDomain::Admin,
        CognitiveDomain::Creative,
        CognitiveDomain::Personal,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "work" => Some(Self::Work),
            "social" => Some(Self::Social),
            "admin" => Some(Self::Admin),
            "creative" => Some(Self::Creative),
            "personal" => Some(Self::Personal),
            _ => None,
        }
    }
}

impl std::fmt::Display for CognitiveDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Work => write!(f, "work"),
            Self::Social => write!(f, "social"),
            Self::Admin => write!(f, "admin"),
            Self::Creative => write!(f, "creative"),
            Self::Personal => write!(f, "personal"),
        }
    }
}

/// Clamp a logged cost to [0, 1]. NaN counts as zero.
pub fn clamp_cost(cost: f64) -> f64 {
    if cost.is_nan() {
        0.0
    } else {
        cost.clamp(0.0, 1.0)
    }
}

/// Single energy debit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetEntry {
    pub domain: CognitiveDomain,
    /// Always in [0, 1]
    pub energy_cost: f64,
    pub timestamp: DateTime<Utc>,
    /// Original cost when it had to be clamped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_cost: Option<f64>,
}

impl BudgetEntry {
    pub fn new(domain: CognitiveDomain, cost: f64, timestamp: DateTime<Utc>) -> Self {
        let energy_cost = clamp_cost(cost);
        // Non-finite costs cannot be serialized, so only finite originals are kept.
        let requested_cost = (cost.is_finite() && energy_cost != cost).then_some(cost);
        Self {
            domain,
            energy_cost,
            timestamp,
            requested_cost,
        }
    }

    pub fn was_clamped(&self) -> bool {
        self.requested_cost.is_some()
    }
}

/// Arena of entries for one user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetLedger {
    entries: Vec<BudgetEntry>,
}

impl BudgetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: BudgetEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[BudgetEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn summary(&self) -> LedgerSummary {
        let mut summary = LedgerSummary::default();
        for entry in &self.entries {
            if entry.was_clamped() {
                summary.clamped += 1;
            }
            summary.lifetime_cost += entry.energy_cost;
        }
        summary.total = self.entries.len();
        summary
    }
}

/// Audit counters over the whole ledger, window ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSummary {
    pub total: usize,
    pub clamped: usize,
    pub lifetime_cost: f64,
}
