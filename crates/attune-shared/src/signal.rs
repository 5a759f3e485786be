//! Behavioral signals produced by external instrumentation.
//!
//! Signals are immutable once recorded. Each known type carries raw bounds;
//! values are clamped into those bounds and normalized to [0, 1] before any
//! scoring happens, so a malformed reading can shift a feature but never
//! push it outside the scale the inference engine expects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of behavioral signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    /// Characters typed per minute
    TypingCadence,
    /// Application or tab switches per minute
    TaskSwitchRate,
    /// Seconds without input before the current interaction
    IdleDuration,
    /// Fraction of actions that were corrected or undone
    ErrorRate,
    /// Milliseconds between a prompt and the user's response
    ResponseLatency,
    /// Anything the instrumentation emits that this engine does not know
    #[serde(other)]
    Unknown,
}

impl SignalType {
    /// Raw value bounds, `None` for unknown types.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match self {
            Self::TypingCadence => Some((0.0, 400.0)),
            Self::TaskSwitchRate => Some((0.0, 10.0)),
            Self::IdleDuration => Some((0.0, 600.0)),
            Self::ErrorRate => Some((0.0, 1.0)),
            Self::ResponseLatency => Some((0.0, 5_000.0)),
            Self::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        self.bounds().is_some()
    }

    /// Clamp a raw value into bounds and map it onto [0, 1].
    ///
    /// Returns `None` for unknown types and non-finite values.
    pub fn normalize(&self, raw: f64) -> Option<f64> {
        if !raw.is_finite() {
            return None;
        }
        let (min, max) = self.bounds()?;
        let clamped = raw.clamp(min, max);
        Some((clamped - min) / (max - min))
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TypingCadence => write!(f, "typing_cadence"),
            Self::TaskSwitchRate => write!(f, "task_switch_rate"),
            Self::IdleDuration => write!(f, "idle_duration"),
            Self::ErrorRate => write!(f, "error_rate"),
            Self::ResponseLatency => write!(f, "response_latency"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A single timestamped behavioral reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CognitiveSignal {
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl CognitiveSignal {
    pub fn new(signal_type: SignalType, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            signal_type,
            value,
            timestamp,
        }
    }

    /// Normalized value, or `None` when the signal must be ignored.
    pub fn normalized(&self) -> Option<f64> {
        self.signal_type.normalize(self.value)
    }
}
