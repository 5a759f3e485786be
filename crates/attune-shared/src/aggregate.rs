//! Signal Aggregator: reduces a time window of signals into scalar features.
//!
//! Pure functions only. Below `MIN_SAMPLE_COUNT` usable samples the window is
//! reported as insufficient and callers fall back to a neutral state with
//! zero confidence.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::signal::{CognitiveSignal, SignalType};

/// Trailing window evaluated on every cycle.
pub const SIGNAL_WINDOW_MINUTES: i64 = 30;

/// Hard floor on usable samples before any inference is attempted.
pub const MIN_SAMPLE_COUNT: usize = 5;

/// Features for a single signal type, computed on normalized values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedFeatures {
    pub mean_value: f64,
    /// Population variance, at most 0.25 on the normalized scale
    pub variance: f64,
    /// Mean first difference per minute
    pub rate_of_change: f64,
    pub sample_count: usize,
}

/// All per-type features for one evaluation window.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSet {
    pub features: BTreeMap<SignalType, AggregatedFeatures>,
    /// Usable samples across all types
    pub sample_count: usize,
}

impl FeatureSet {
    pub fn get(&self, signal_type: SignalType) -> Option<&AggregatedFeatures> {
        self.features.get(&signal_type)
    }

    pub fn mean(&self, signal_type: SignalType) -> Option<f64> {
        self.get(signal_type).map(|f| f.mean_value)
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Outcome of aggregating one window.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// Too few usable samples; inference must not run.
    Insufficient { sample_count: usize },
    Ready(FeatureSet),
}

impl Aggregation {
    pub fn features(&self) -> Option<&FeatureSet> {
        match self {
            Self::Ready(features) => Some(features),
            Self::Insufficient { .. } => None,
        }
    }
}

/// Start of the trailing window ending at `now`.
pub fn window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::minutes(SIGNAL_WINDOW_MINUTES)
}

/// Aggregate the signals that fall inside the window ending at `now`.
///
/// Signals outside the window, of unknown type, or with non-finite values are
/// skipped. Out-of-range values are clamped by normalization.
pub fn aggregate(signals: &[CognitiveSignal], now: DateTime<Utc>) -> Aggregation {
    let start = window_start(now);
    let mut by_type: BTreeMap<SignalType, Vec<(DateTime<Utc>, f64)>> = BTreeMap::new();
    let mut dropped = 0usize;

    for signal in signals {
        if signal.timestamp < start || signal.timestamp > now {
            continue;
        }
        match signal.normalized() {
            Some(value) => by_type
                .entry(signal.signal_type)
                .or_default()
                .push((signal.timestamp, value)),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!("Ignored {} malformed or unknown signals", dropped);
    }

    let sample_count: usize = by_type.values().map(Vec::len).sum();
    if sample_count < MIN_SAMPLE_COUNT {
        return Aggregation::Insufficient { sample_count };
    }

    let features = by_type
        .into_iter()
        .map(|(signal_type, mut samples)| {
            samples.sort_by_key(|(ts, _)| *ts);
            (signal_type, summarize(&samples))
        })
        .collect();

    Aggregation::Ready(FeatureSet {
        features,
        sample_count,
    })
}

fn summarize(samples: &[(DateTime<Utc>, f64)]) -> AggregatedFeatures {
    let n = samples.len() as f64;
    let mean = samples.iter().map(|(_, v)| v).sum::<f64>() / n;
    let variance = samples.iter().map(|(_, v)| (v - mean).powi(2)).sum::<f64>() / n;

    // Sum of first differences telescopes to last - first.
    let rate_of_change = match (samples.first(), samples.last()) {
        (Some((t0, v0)), Some((t1, v1))) if t1 > t0 => {
            let minutes = (*t1 - *t0).num_milliseconds() as f64 / 60_000.0;
            (v1 - v0) / minutes
        }
        _ => 0.0,
    };

    AggregatedFeatures {
        mean_value: mean,
        variance,
        rate_of_change,
        sample_count: samples.len(),
    }
}
