//! Notification Modality Router.
//!
//! A first-match decision table. Rows are evaluated top to bottom and the
//! first one that matches decides; the matched row is returned with the
//! modality so every decision can be audited.
//!
//! | # | condition                                         | modality            |
//! |---|---------------------------------------------------|---------------------|
//! | 1 | critical and push subscription                    | push                |
//! | 2 | flow/hyperfocus                                   | critical: push or in-app, else batch |
//! | 3 | overload                                          | critical: in-app, else silent |
//! | 4 | inside quiet hours and not critical               | batch               |
//! | 5 | critical-only preference and below high           | batch               |
//! | 6 | high and push subscription                        | push                |
//! | 7 | anything else                                     | in-app              |
//!
//! The budget is not read here: it reaches routing through the state the
//! inference engine derives from it.

use serde::{Deserialize, Serialize};

use crate::notification::{NotificationRequest, Priority};
use crate::state::CognitiveState;

/// Default quiet window start, used when the user never set one.
pub const DEFAULT_SLEEP_HOUR: u8 = 22;

/// Default quiet window end.
pub const DEFAULT_WAKE_HOUR: u8 = 7;

/// Delivery channel and timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Modality {
    Push,
    InApp,
    /// Logged for the digest only
    Silent,
    /// Deferred, delivered on its channel once conditions change
    Batch,
}

impl Modality {
    /// Whether the gateway should be called right away.
    pub fn is_immediate(&self) -> bool {
        matches!(self, Self::Push | Self::InApp)
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Push => write!(f, "push"),
            Self::InApp => write!(f, "in-app"),
            Self::Silent => write!(f, "silent"),
            Self::Batch => write!(f, "batch"),
        }
    }
}

/// How often the user wants to be alerted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertFrequency {
    All,
    CriticalOnly,
}

impl Default for AlertFrequency {
    fn default() -> Self {
        Self::All
    }
}

/// Quiet window `[sleep_hour, wake_hour)`, wrapping past midnight.
///
/// Deserialization rejects hours outside 0-23.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "QuietHoursWire")]
pub struct QuietHours {
    pub sleep_hour: u8,
    pub wake_hour: u8,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuietHoursWire {
    sleep_hour: u8,
    wake_hour: u8,
}

impl TryFrom<QuietHoursWire> for QuietHours {
    type Error = String;

    fn try_from(wire: QuietHoursWire) -> Result<Self, Self::Error> {
        for (field, hour) in [("sleepHour", wire.sleep_hour), ("wakeHour", wire.wake_hour)] {
            if hour > 23 {
                return Err(format!("{} must be 0-23, got {}", field, hour));
            }
        }
        Ok(Self {
            sleep_hour: wire.sleep_hour,
            wake_hour: wire.wake_hour,
        })
    }
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            sleep_hour: DEFAULT_SLEEP_HOUR,
            wake_hour: DEFAULT_WAKE_HOUR,
        }
    }
}

impl QuietHours {
    pub fn new(sleep_hour: u8, wake_hour: u8) -> Self {
        Self {
            sleep_hour: sleep_hour % 24,
            wake_hour: wake_hour % 24,
        }
    }

    /// Equal hours describe an empty window.
    pub fn contains(&self, hour: u32) -> bool {
        let hour = hour % 24;
        let sleep = u32::from(self.sleep_hour % 24);
        let wake = u32::from(self.wake_hour % 24);
        if sleep < wake {
            hour >= sleep && hour < wake
        } else if sleep > wake {
            hour >= sleep || hour < wake
        } else {
            false
        }
    }
}

/// Everything besides priority that the decision depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingContext {
    pub state: CognitiveState,
    /// `None` falls back to the 22:00-07:00 default
    pub quiet_hours: Option<QuietHours>,
    pub alert_frequency: AlertFrequency,
    pub has_push_subscription: bool,
    /// Local wall-clock hour, 0-23
    pub current_hour: u32,
}

/// Row of the decision table that produced a modality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingRule {
    CriticalPush,
    DeepFocus,
    Overload,
    QuietHours,
    CriticalOnlyPreference,
    HighPriorityPush,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModalityDecision {
    pub modality: Modality,
    pub rule: RoutingRule,
}

impl ModalityDecision {
    fn new(modality: Modality, rule: RoutingRule) -> Self {
        Self { modality, rule }
    }
}

/// Decide a modality from priority and context.
pub fn decide(priority: Priority, ctx: &RoutingContext) -> ModalityDecision {
    use Modality::*;

    let critical = priority == Priority::Critical;

    if critical && ctx.has_push_subscription {
        return ModalityDecision::new(Push, RoutingRule::CriticalPush);
    }

    if ctx.state.is_deep_focus() {
        let modality = match (critical, ctx.has_push_subscription) {
            (true, true) => Push,
            (true, false) => InApp,
            (false, _) => Batch,
        };
        return ModalityDecision::new(modality, RoutingRule::DeepFocus);
    }

    if ctx.state == CognitiveState::Overload {
        let modality = if critical { InApp } else { Silent };
        return ModalityDecision::new(modality, RoutingRule::Overload);
    }

    let quiet = ctx.quiet_hours.unwrap_or_default();
    if quiet.contains(ctx.current_hour) && !critical {
        return ModalityDecision::new(Batch, RoutingRule::QuietHours);
    }

    if ctx.alert_frequency == AlertFrequency::CriticalOnly
        && !matches!(priority, Priority::Critical | Priority::High)
    {
        return ModalityDecision::new(Batch, RoutingRule::CriticalOnlyPreference);
    }

    if priority == Priority::High && ctx.has_push_subscription {
        return ModalityDecision::new(Push, RoutingRule::HighPriorityPush);
    }

    ModalityDecision::new(InApp, RoutingRule::Default)
}

/// Route a request under a context.
pub fn route_notification(request: &NotificationRequest, ctx: &RoutingContext) -> ModalityDecision {
    decide(request.priority, ctx)
}
