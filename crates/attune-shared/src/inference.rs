//! State Inference Engine.
//!
//! Rule-based classification of aggregated features into one `CognitiveState`.
//! Each state has a prototype point in a six-dimensional indicator space; the
//! current window is scored by root-mean-square distance to every prototype
//! over the indicators that are actually present. Near-ties resolve toward the
//! more protective state.
//!
//! The engine is pure: persistence of the result belongs to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregation, FeatureSet};
use crate::signal::SignalType;
use crate::state::{CognitiveState, CognitiveStateResult, StatePrediction, StateRecord};

// === Thresholds ===

/// Distance gap under which two states count as tied.
pub const TIE_EPSILON: f64 = 0.02;

/// Samples at which the sample-size factor stops penalizing confidence.
pub const FULL_CONFIDENCE_SAMPLES: usize = 20;

/// Sample-size factor at the minimum window size.
pub const LOW_SAMPLE_FACTOR: f64 = 0.5;

/// Multiplier applied when no personal baseline exists.
pub const UNBASELINED_FACTOR: f64 = 0.8;

/// Confidence ceiling without a baseline.
pub const UNBASELINED_CEILING: f64 = 0.75;

/// Confidence ceiling with a baseline.
pub const BASELINED_CEILING: f64 = 0.95;

/// Share of a user's habitual offset removed before scoring.
pub const BASELINE_WEIGHT: f64 = 0.5;

/// Prior-day records needed before a baseline is trusted.
pub const MIN_BASELINE_RECORDS: usize = 3;

/// Remaining budget under which fatigue is favoured.
pub const LOW_BUDGET_THRESHOLD: f64 = 0.2;

/// Distance discount granted to the fatigued prototype on a low budget.
pub const LOW_BUDGET_FATIGUE_BIAS: f64 = 0.05;

/// Normalized change per minute that counts as a trend (0.15 over a window).
pub const TREND_THRESHOLD: f64 = 0.005;

/// Predictions further out than this are not reported.
pub const PREDICTION_HORIZON_MINUTES: f64 = 60.0;

// === Indicator space ===

const INDICATOR_COUNT: usize = 6;

/// Scoring dimensions derived from signal features, all on [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Typing,
    Switching,
    Idle,
    IdleVariance,
    Errors,
    Latency,
}

impl Indicator {
    pub const ALL: [Indicator; INDICATOR_COUNT] = [
        Indicator::Typing,
        Indicator::Switching,
        Indicator::Idle,
        Indicator::IdleVariance,
        Indicator::Errors,
        Indicator::Latency,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Signal type whose trend drives this indicator, if any.
    fn source(self) -> Option<SignalType> {
        match self {
            Self::Typing => Some(SignalType::TypingCadence),
            Self::Switching => Some(SignalType::TaskSwitchRate),
            Self::Idle => Some(SignalType::IdleDuration),
            Self::IdleVariance => None,
            Self::Errors => Some(SignalType::ErrorRate),
            Self::Latency => Some(SignalType::ResponseLatency),
        }
    }
}

/// Indicator values; `None` where no signal of that kind was seen.
pub type IndicatorVector = [Option<f64>; INDICATOR_COUNT];

/// Prototype points, ordered typing, switching, idle, idle variance, errors,
/// latency.
const PROTOTYPES: [(CognitiveState, [f64; INDICATOR_COUNT]); 7] = [
    (CognitiveState::Neutral, [0.40, 0.30, 0.30, 0.20, 0.20, 0.40]),
    (CognitiveState::Flow, [0.65, 0.10, 0.10, 0.10, 0.10, 0.30]),
    (CognitiveState::Hyperfocus, [0.85, 0.02, 0.02, 0.05, 0.15, 0.20]),
    (CognitiveState::Distracted, [0.30, 0.80, 0.50, 0.80, 0.30, 0.50]),
    (CognitiveState::Overload, [0.70, 0.70, 0.10, 0.30, 0.80, 0.80]),
    (CognitiveState::Fatigued, [0.15, 0.20, 0.70, 0.40, 0.50, 0.85]),
    (CognitiveState::Recovery, [0.25, 0.15, 0.60, 0.30, 0.10, 0.40]),
];

fn prototype(state: CognitiveState) -> &'static [f64; INDICATOR_COUNT] {
    PROTOTYPES
        .iter()
        .find(|(s, _)| *s == state)
        .map(|(_, p)| p)
        .unwrap_or(&PROTOTYPES[0].1)
}

/// Extract indicators from a feature set.
pub fn indicators(features: &FeatureSet) -> IndicatorVector {
    let mut out = [None; INDICATOR_COUNT];
    out[Indicator::Typing.index()] = features.mean(SignalType::TypingCadence);
    out[Indicator::Switching.index()] = features.mean(SignalType::TaskSwitchRate);
    out[Indicator::Idle.index()] = features.mean(SignalType::IdleDuration);
    // Normalized variance peaks at 0.25.
    out[Indicator::IdleVariance.index()] = features
        .get(SignalType::IdleDuration)
        .map(|f| (f.variance * 4.0).clamp(0.0, 1.0));
    out[Indicator::Errors.index()] = features.mean(SignalType::ErrorRate);
    out[Indicator::Latency.index()] = features.mean(SignalType::ResponseLatency);
    out
}

// === Baseline ===

/// A user's habitual indicator levels from prior days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Baseline {
    pub indicators: [Option<f64>; INDICATOR_COUNT],
    pub record_count: usize,
}

impl Baseline {
    /// Build a baseline from history rows evaluated before the current UTC day.
    ///
    /// Rows without features (insufficient windows) are skipped. Returns
    /// `None` until `MIN_BASELINE_RECORDS` usable rows exist.
    pub fn from_records(records: &[StateRecord], now: DateTime<Utc>) -> Option<Self> {
        let day_start = now.date_naive().and_hms_opt(0, 0, 0)?.and_utc();
        let prior: Vec<IndicatorVector> = records
            .iter()
            .filter(|r| r.evaluated_at < day_start && !r.features.is_empty())
            .map(|r| indicators(&r.features))
            .collect();

        if prior.len() < MIN_BASELINE_RECORDS {
            return None;
        }

        let mut averaged = [None; INDICATOR_COUNT];
        for (i, slot) in averaged.iter_mut().enumerate() {
            let values: Vec<f64> = prior.iter().filter_map(|v| v[i]).collect();
            if !values.is_empty() {
                *slot = Some(values.iter().sum::<f64>() / values.len() as f64);
            }
        }

        Some(Self {
            indicators: averaged,
            record_count: prior.len(),
        })
    }

    /// Remove part of the user's habitual offset from the neutral reference.
    pub fn adjust(&self, current: &IndicatorVector) -> IndicatorVector {
        let neutral = prototype(CognitiveState::Neutral);
        let mut out = *current;
        for (i, slot) in out.iter_mut().enumerate() {
            if let (Some(x), Some(b)) = (*slot, self.indicators[i]) {
                *slot = Some((x - BASELINE_WEIGHT * (b - neutral[i])).clamp(0.0, 1.0));
            }
        }
        out
    }
}

// === Scoring ===

/// Distance of the current window to one state's prototype.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateScore {
    pub state: CognitiveState,
    pub distance: f64,
}

/// RMS distance over the indicators that are present.
fn distance(current: &IndicatorVector, proto: &[f64; INDICATOR_COUNT]) -> Option<f64> {
    let diffs: Vec<f64> = current
        .iter()
        .zip(proto.iter())
        .filter_map(|(x, p)| x.map(|x| (x - p).powi(2)))
        .collect();
    if diffs.is_empty() {
        return None;
    }
    Some((diffs.iter().sum::<f64>() / diffs.len() as f64).sqrt())
}

/// Score every state. Empty when no indicator is present.
pub fn score_states(current: &IndicatorVector, budget_remaining: f64) -> Vec<StateScore> {
    PROTOTYPES
        .iter()
        .filter_map(|(state, proto)| {
            let mut d = distance(current, proto)?;
            if *state == CognitiveState::Fatigued && budget_remaining < LOW_BUDGET_THRESHOLD {
                d = (d - LOW_BUDGET_FATIGUE_BIAS).max(0.0);
            }
            Some(StateScore {
                state: *state,
                distance: d,
            })
        })
        .collect()
}

/// Pick the closest state; within `TIE_EPSILON` of the best, the more
/// protective state wins.
pub fn resolve(scores: &[StateScore]) -> Option<StateScore> {
    let best = scores
        .iter()
        .map(|s| s.distance)
        .fold(f64::INFINITY, f64::min);
    scores
        .iter()
        .filter(|s| s.distance <= best + TIE_EPSILON)
        .min_by_key(|s| s.state.protection_rank())
        .copied()
}

/// Confidence from match quality, sample sufficiency and baseline presence.
pub fn confidence(distance: f64, sample_count: usize, has_baseline: bool) -> f64 {
    let base = (1.0 - distance).clamp(0.0, 1.0);
    let sufficiency = (sample_count as f64 / FULL_CONFIDENCE_SAMPLES as f64).min(1.0);
    let sample_factor = LOW_SAMPLE_FACTOR + (1.0 - LOW_SAMPLE_FACTOR) * sufficiency;
    let (baseline_factor, ceiling) = if has_baseline {
        (1.0, BASELINED_CEILING)
    } else {
        (UNBASELINED_FACTOR, UNBASELINED_CEILING)
    };
    (base * sample_factor * baseline_factor).clamp(0.0, ceiling)
}

fn filled(current: &IndicatorVector, indicator: Indicator) -> f64 {
    current[indicator.index()].unwrap_or(prototype(CognitiveState::Neutral)[indicator.index()])
}

fn stress_index(current: &IndicatorVector) -> f64 {
    (0.40 * filled(current, Indicator::Errors)
        + 0.35 * filled(current, Indicator::Switching)
        + 0.25 * filled(current, Indicator::Latency))
    .clamp(0.0, 1.0)
}

fn focus_level(current: &IndicatorVector) -> f64 {
    (0.5 * filled(current, Indicator::Typing)
        + 0.3 * (1.0 - filled(current, Indicator::Switching))
        + 0.2 * (1.0 - filled(current, Indicator::Idle)))
    .clamp(0.0, 1.0)
}

// === Prediction ===

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trend {
    Rising,
    Falling,
}

/// Ordered transition table; the first matching row wins.
const TRANSITIONS: [(CognitiveState, Indicator, Trend, CognitiveState); 10] = [
    (CognitiveState::Hyperfocus, Indicator::Errors, Trend::Rising, CognitiveState::Fatigued),
    (CognitiveState::Flow, Indicator::Errors, Trend::Rising, CognitiveState::Fatigued),
    (CognitiveState::Flow, Indicator::Switching, Trend::Rising, CognitiveState::Distracted),
    (CognitiveState::Flow, Indicator::Typing, Trend::Rising, CognitiveState::Hyperfocus),
    (CognitiveState::Distracted, Indicator::Switching, Trend::Rising, CognitiveState::Overload),
    (CognitiveState::Neutral, Indicator::Switching, Trend::Rising, CognitiveState::Distracted),
    (CognitiveState::Neutral, Indicator::Typing, Trend::Rising, CognitiveState::Flow),
    (CognitiveState::Overload, Indicator::Errors, Trend::Falling, CognitiveState::Recovery),
    (CognitiveState::Fatigued, Indicator::Idle, Trend::Rising, CognitiveState::Recovery),
    (CognitiveState::Recovery, Indicator::Typing, Trend::Rising, CognitiveState::Neutral),
];

fn trend_of(features: &FeatureSet, indicator: Indicator) -> Option<(Trend, f64)> {
    let rate = features.get(indicator.source()?)?.rate_of_change;
    if rate > TREND_THRESHOLD {
        Some((Trend::Rising, rate))
    } else if rate < -TREND_THRESHOLD {
        Some((Trend::Falling, rate))
    } else {
        None
    }
}

/// Short-horizon prediction from per-type trends.
pub fn predict(
    state: CognitiveState,
    current: &IndicatorVector,
    features: &FeatureSet,
) -> Option<StatePrediction> {
    TRANSITIONS
        .iter()
        .filter(|(from, ..)| *from == state)
        .find_map(|(_, indicator, expected, next)| {
            let (trend, rate) = trend_of(features, *indicator)?;
            if trend != *expected {
                return None;
            }
            let x = current[indicator.index()]?;
            let gap = prototype(*next)[indicator.index()] - x;
            // Already past the target and moving further away
            if gap != 0.0 && gap.signum() != rate.signum() {
                return None;
            }
            let minutes = (gap.abs() / rate.abs()).ceil();
            if minutes > PREDICTION_HORIZON_MINUTES {
                return None;
            }
            Some(StatePrediction {
                next_state: *next,
                time_to_onset_minutes: minutes.max(1.0) as u32,
            })
        })
}

// === Entry points ===

/// Classify a ready feature set.
pub fn infer(
    features: &FeatureSet,
    baseline: Option<&Baseline>,
    budget_remaining: f64,
) -> CognitiveStateResult {
    let budget_remaining = budget_remaining.clamp(0.0, 1.0);
    let raw = indicators(features);
    let current = match baseline {
        Some(b) => b.adjust(&raw),
        None => raw,
    };

    let scores = score_states(&current, budget_remaining);
    let Some(chosen) = resolve(&scores) else {
        return CognitiveStateResult::insufficient_data(budget_remaining);
    };

    CognitiveStateResult {
        state: chosen.state,
        confidence: confidence(chosen.distance, features.sample_count, baseline.is_some()),
        stress_index: stress_index(&current),
        focus_level: focus_level(&current),
        cognitive_budget: budget_remaining,
        prediction: predict(chosen.state, &current, features),
    }
}

/// Classify an aggregation outcome, falling back to neutral on sparse data.
pub fn evaluate(
    aggregation: &Aggregation,
    baseline: Option<&Baseline>,
    budget_remaining: f64,
) -> CognitiveStateResult {
    match aggregation {
        Aggregation::Ready(features) => infer(features, baseline, budget_remaining),
        Aggregation::Insufficient { .. } => {
            CognitiveStateResult::insufficient_data(budget_remaining.clamp(0.0, 1.0))
        }
    }
}
