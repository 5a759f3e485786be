//! Adaptive Token Generator.
//!
//! `(state, mode) -> AdaptiveTokens`, with no I/O and no randomness, so the
//! same inputs always render the same UI. The mode scales how far numeric
//! tokens move away from the neutral bundle; categorical tokens (tone, badge
//! visibility) switch in both active modes. `Invisible` always yields the
//! neutral bundle.

use serde::{Deserialize, Serialize};

use crate::state::CognitiveState;

/// How strongly the UI adapts to the inferred state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptationMode {
    Invisible,
    Subtle,
    Visible,
}

impl AdaptationMode {
    /// Multiplier on numeric deltas.
    pub fn intensity(&self) -> f64 {
        match self {
            Self::Invisible => 0.0,
            Self::Subtle => 0.5,
            Self::Visible => 1.0,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "invisible" => Some(Self::Invisible),
            "subtle" => Some(Self::Subtle),
            "visible" => Some(Self::Visible),
            _ => None,
        }
    }
}

impl Default for AdaptationMode {
    fn default() -> Self {
        Self::Subtle
    }
}

/// Palette direction for accents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccentTone {
    Neutral,
    Focus,
    Calm,
    Warm,
}

/// UI-facing parameters. Recomputed on every state change, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveTokens {
    /// 0 = static UI, 1 = full motion
    pub animation_intensity: f64,
    /// 0 = sparse, 1 = dense
    pub information_density: f64,
    pub motion_duration_ms: u32,
    pub spacing_scale: f64,
    pub contrast_boost: f64,
    pub max_visible_items: u32,
    pub show_badges: bool,
    pub accent_tone: AccentTone,
}

impl AdaptiveTokens {
    pub fn neutral() -> Self {
        Self {
            animation_intensity: 0.5,
            information_density: 0.5,
            motion_duration_ms: 250,
            spacing_scale: 1.0,
            contrast_boost: 0.0,
            max_visible_items: 12,
            show_badges: true,
            accent_tone: AccentTone::Neutral,
        }
    }
}

/// Full-intensity change applied by a state.
#[derive(Debug, Clone, Copy)]
struct StateDelta {
    animation: f64,
    density: f64,
    motion_ms: i32,
    spacing: f64,
    contrast: f64,
    items: i32,
    show_badges: bool,
    tone: AccentTone,
}

const NO_DELTA: StateDelta = StateDelta {
    animation: 0.0,
    density: 0.0,
    motion_ms: 0,
    spacing: 0.0,
    contrast: 0.0,
    items: 0,
    show_badges: true,
    tone: AccentTone::Neutral,
};

fn delta_for(state: CognitiveState) -> StateDelta {
    match state {
        CognitiveState::Neutral => NO_DELTA,
        CognitiveState::Flow => StateDelta {
            animation: -0.30,
            density: 0.10,
            motion_ms: -100,
            items: -2,
            show_badges: false,
            tone: AccentTone::Focus,
            ..NO_DELTA
        },
        CognitiveState::Hyperfocus => StateDelta {
            animation: -0.45,
            density: 0.20,
            motion_ms: -150,
            items: -4,
            show_badges: false,
            tone: AccentTone::Focus,
            ..NO_DELTA
        },
        CognitiveState::Distracted => StateDelta {
            animation: -0.35,
            density: -0.25,
            spacing: 0.15,
            items: -5,
            show_badges: false,
            tone: AccentTone::Calm,
            ..NO_DELTA
        },
        CognitiveState::Overload => StateDelta {
            animation: -0.50,
            density: -0.35,
            motion_ms: 150,
            spacing: 0.25,
            contrast: 0.10,
            items: -7,
            show_badges: false,
            tone: AccentTone::Calm,
        },
        CognitiveState::Fatigued => StateDelta {
            animation: -0.25,
            density: -0.20,
            motion_ms: 100,
            spacing: 0.10,
            contrast: 0.20,
            items: -4,
            tone: AccentTone::Warm,
            ..NO_DELTA
        },
        CognitiveState::Recovery => StateDelta {
            animation: -0.10,
            density: -0.10,
            spacing: 0.05,
            items: -2,
            tone: AccentTone::Warm,
            ..NO_DELTA
        },
    }
}

/// Tokens for a state under an adaptation mode.
pub fn adaptive_tokens(state: CognitiveState, mode: AdaptationMode) -> AdaptiveTokens {
    let neutral = AdaptiveTokens::neutral();
    if mode == AdaptationMode::Invisible {
        return neutral;
    }

    let k = mode.intensity();
    let d = delta_for(state);
    let scaled_i32 = |base: u32, delta: i32| -> u32 {
        (base as f64 + delta as f64 * k).round().max(0.0) as u32
    };

    AdaptiveTokens {
        animation_intensity: (neutral.animation_intensity + d.animation * k).clamp(0.0, 1.0),
        information_density: (neutral.information_density + d.density * k).clamp(0.0, 1.0),
        motion_duration_ms: scaled_i32(neutral.motion_duration_ms, d.motion_ms),
        spacing_scale: neutral.spacing_scale + d.spacing * k,
        contrast_boost: (neutral.contrast_boost + d.contrast * k).clamp(0.0, 1.0),
        max_visible_items: scaled_i32(neutral.max_visible_items, d.items).max(1),
        show_badges: d.show_badges,
        accent_tone: d.tone,
    }
}
