//! Cognitive state classification results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::FeatureSet;

/// Discrete attentional/stress condition of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CognitiveState {
    Neutral,
    Flow,
    Hyperfocus,
    Distracted,
    Overload,
    Fatigued,
    Recovery,
}

impl CognitiveState {
    pub const ALL: [CognitiveState; 7] = [
        CognitiveState::Neutral,
        CognitiveState::Flow,
        CognitiveState::Hyperfocus,
        CognitiveState::Distracted,
        CognitiveState::Overload,
        CognitiveState::Fatigued,
        CognitiveState::Recovery,
    ];

    /// Tie-break rank, lower means more disruptive and therefore more
    /// protective to assume.
    pub fn protection_rank(&self) -> u8 {
        match self {
            Self::Overload => 0,
            Self::Hyperfocus => 1,
            Self::Distracted => 2,
            Self::Fatigued => 3,
            Self::Flow => 4,
            Self::Recovery => 5,
            Self::Neutral => 6,
        }
    }

    /// States where interruptions break deep concentration.
    pub fn is_deep_focus(&self) -> bool {
        matches!(self, Self::Flow | Self::Hyperfocus)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "neutral" => Some(Self::Neutral),
            "flow" => Some(Self::Flow),
            "hyperfocus" => Some(Self::Hyperfocus),
            "distracted" => Some(Self::Distracted),
            "overload" => Some(Self::Overload),
            "fatigued" => Some(Self::Fatigued),
            "recovery" => Some(Self::Recovery),
            _ => None,
        }
    }
}

impl Default for CognitiveState {
    fn default() -> Self {
        Self::Neutral
    }
}

impl std::fmt::Display for CognitiveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Neutral => "neutral",
            Self::Flow => "flow",
            Self::Hyperfocus => "hyperfocus",
            Self::Distracted => "distracted",
            Self::Overload => "overload",
            Self::Fatigued => "fatigued",
            Self::Recovery => "recovery",
        };
        write!(f, "{}", s)
    }
}

/// Expected next state within the short horizon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePrediction {
    pub next_state: CognitiveState,
    pub time_to_onset_minutes: u32,
}

/// Output of one evaluation cycle. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CognitiveStateResult {
    pub state: CognitiveState,
    /// In [0, 1]
    pub confidence: f64,
    /// In [0, 1]
    pub stress_index: f64,
    /// In [0, 1]
    pub focus_level: f64,
    /// Remaining daily budget at evaluation time, in [0, capacity]
    pub cognitive_budget: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<StatePrediction>,
}

impl CognitiveStateResult {
    /// Fallback for sparse windows: neutral with zero confidence.
    pub fn insufficient_data(cognitive_budget: f64) -> Self {
        Self {
            state: CognitiveState::Neutral,
            confidence: 0.0,
            stress_index: 0.0,
            focus_level: 0.0,
            cognitive_budget,
            prediction: None,
        }
    }
}

/// Persisted history row: the result plus the features that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRecord {
    pub result: CognitiveStateResult,
    /// Empty when the window was insufficient
    pub features: FeatureSet,
    pub evaluated_at: DateTime<Utc>,
}
