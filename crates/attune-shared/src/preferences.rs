//! Per-user notification and adaptation preferences.
//!
//! Every field is optional. Anything unset resolves to the daemon defaults
//! instead of failing the decision that needed it.

use serde::{Deserialize, Serialize};

use crate::routing::{AlertFrequency, QuietHours};
use crate::tokens::AdaptationMode;

/// Preferences as stored for a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    #[serde(default)]
    pub quiet_hours: Option<QuietHours>,
    #[serde(default)]
    pub alert_frequency: Option<AlertFrequency>,
    #[serde(default)]
    pub adaptation_mode: Option<AdaptationMode>,
    #[serde(default)]
    pub has_push_subscription: bool,
}

/// Fallbacks for unset preferences.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceDefaults {
    pub quiet_hours: QuietHours,
    pub alert_frequency: AlertFrequency,
    pub adaptation_mode: AdaptationMode,
}

impl Default for PreferenceDefaults {
    fn default() -> Self {
        Self {
            quiet_hours: QuietHours::default(),
            alert_frequency: AlertFrequency::default(),
            adaptation_mode: AdaptationMode::default(),
        }
    }
}

/// Preferences with every gap filled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPreferences {
    pub quiet_hours: QuietHours,
    pub alert_frequency: AlertFrequency,
    pub adaptation_mode: AdaptationMode,
    pub has_push_subscription: bool,
}

impl UserPreferences {
    pub fn resolve(&self, defaults: &PreferenceDefaults) -> ResolvedPreferences {
        ResolvedPreferences {
            quiet_hours: self.quiet_hours.unwrap_or(defaults.quiet_hours),
            alert_frequency: self.alert_frequency.unwrap_or(defaults.alert_frequency),
            adaptation_mode: self.adaptation_mode.unwrap_or(defaults.adaptation_mode),
            has_push_subscription: self.has_push_subscription,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_missing_uses_defaults() {
        let resolved = UserPreferences::default().resolve(&PreferenceDefaults::default());
        assert_eq!(resolved.quiet_hours, QuietHours::new(22, 7));
        assert_eq!(resolved.alert_frequency, AlertFrequency::All);
        assert_eq!(resolved.adaptation_mode, AdaptationMode::Subtle);
        assert!(!resolved.has_push_subscription);
    }

    #[test]
    fn test_resolve_keeps_user_values() {
        let prefs: UserPreferences = serde_json::from_str(
            r#"{"quietHours":{"sleepHour":23,"wakeHour":6},"alertFrequency":"critical-only","hasPushSubscription":true}"#,
        )
        .unwrap();
        let resolved = prefs.resolve(&PreferenceDefaults::default());
        assert_eq!(resolved.quiet_hours, QuietHours::new(23, 6));
        assert_eq!(resolved.alert_frequency, AlertFrequency::CriticalOnly);
        assert_eq!(resolved.adaptation_mode, AdaptationMode::Subtle);
        assert!(resolved.has_push_subscription);
    }
}
