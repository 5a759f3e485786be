//! Configuration management for attuned.
//!
//! Loads settings from /etc/attune/config.toml or uses defaults.
//! `ATTUNE_CONFIG` points at an alternative file.

use anyhow::Result;
use attune_shared::budget::{BUDGET_WINDOW_HOURS, DOMAIN_FLOOR, GLOBAL_FLOOR};
use attune_shared::routing::{DEFAULT_SLEEP_HOUR, DEFAULT_WAKE_HOUR};
use attune_shared::{AdaptationMode, AlertFrequency, BudgetPolicy, PreferenceDefaults, QuietHours};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/attune/config.toml";

/// Default config file path for fallback
pub const DEFAULT_CONFIG_PATH: &str = "/var/lib/attune/config.toml";

/// Environment override for the config path
pub const CONFIG_ENV: &str = "ATTUNE_CONFIG";

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// HTTP listen address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Log filter used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_bind_addr() -> String {
    // Localhost only; a reverse proxy fronts public traffic
    "127.0.0.1:7870".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            log_level: default_log_level(),
        }
    }
}

/// Evaluation loop timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// State inference interval per active session
    #[serde(default = "default_state_interval")]
    pub state_interval_secs: u64,

    /// Budget recomputation interval per active session
    #[serde(default = "default_budget_interval")]
    pub budget_interval_secs: u64,
}

fn default_state_interval() -> u64 {
    120
}

fn default_budget_interval() -> u64 {
    300
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            state_interval_secs: default_state_interval(),
            budget_interval_secs: default_budget_interval(),
        }
    }
}

/// Budget policy overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Rolling window in hours
    #[serde(default = "default_window_hours")]
    pub window_hours: i64,

    /// Per-domain floor
    #[serde(default = "default_domain_floor")]
    pub domain_floor: f64,

    /// Overall floor
    #[serde(default = "default_global_floor")]
    pub global_floor: f64,
}

fn default_window_hours() -> i64 {
    BUDGET_WINDOW_HOURS
}

fn default_domain_floor() -> f64 {
    DOMAIN_FLOOR
}

fn default_global_floor() -> f64 {
    GLOBAL_FLOOR
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            window_hours: default_window_hours(),
            domain_floor: default_domain_floor(),
            global_floor: default_global_floor(),
        }
    }
}

impl BudgetConfig {
    /// Convert to the policy used by the budget reduction.
    /// Out-of-range values fall back to the built-in constants.
    pub fn to_policy(&self) -> BudgetPolicy {
        let defaults = BudgetPolicy::default();
        BudgetPolicy {
            window_hours: if self.window_hours > 0 {
                self.window_hours
            } else {
                defaults.window_hours
            },
            domain_floor: valid_floor(self.domain_floor).unwrap_or(defaults.domain_floor),
            global_floor: valid_floor(self.global_floor).unwrap_or(defaults.global_floor),
        }
    }
}

fn valid_floor(v: f64) -> Option<f64> {
    (v.is_finite() && (0.0..=1.0).contains(&v)).then_some(v)
}

/// Preference fallbacks for users who never set them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_sleep_hour")]
    pub sleep_hour: u8,

    #[serde(default = "default_wake_hour")]
    pub wake_hour: u8,

    #[serde(default)]
    pub alert_frequency: AlertFrequency,

    #[serde(default)]
    pub adaptation_mode: AdaptationMode,
}

fn default_sleep_hour() -> u8 {
    DEFAULT_SLEEP_HOUR
}

fn default_wake_hour() -> u8 {
    DEFAULT_WAKE_HOUR
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            sleep_hour: default_sleep_hour(),
            wake_hour: default_wake_hour(),
            alert_frequency: AlertFrequency::default(),
            adaptation_mode: AdaptationMode::default(),
        }
    }
}

impl DefaultsConfig {
    pub fn to_preference_defaults(&self) -> PreferenceDefaults {
        PreferenceDefaults {
            quiet_hours: QuietHours::new(self.sleep_hour, self.wake_hour),
            alert_frequency: self.alert_frequency,
            adaptation_mode: self.adaptation_mode,
        }
    }
}

/// Full daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,

    #[serde(default)]
    pub evaluation: EvaluationConfig,

    #[serde(default)]
    pub budget: BudgetConfig,

    #[serde(default)]
    pub defaults: DefaultsConfig,
}

impl Config {
    /// Load config from file, or return defaults
    pub fn load() -> Self {
        Self::load_from_candidates(
            std::env::var(CONFIG_ENV).ok(),
            &[Path::new(CONFIG_PATH), Path::new(DEFAULT_CONFIG_PATH)],
        )
    }

    /// Try the override first, then each system path in order.
    pub fn load_from_candidates(override_path: Option<String>, system_paths: &[&Path]) -> Self {
        if let Some(path) = override_path {
            match Self::load_from_path(&path) {
                Ok(config) => return config,
                Err(e) => warn!("Config {} unreadable ({}), trying system paths", path, e),
            }
        }

        let mut last_error = None;
        for path in system_paths {
            match Self::load_from_path(path) {
                Ok(config) => return config,
                Err(e) => last_error = Some(e),
            }
        }
        match last_error {
            Some(e) => warn!("Config not found, using defaults: {}", e),
            None => warn!("Config not found, using defaults"),
        }
        Config::default()
    }

    /// Load config from specific path
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.daemon.bind_addr, "127.0.0.1:7870");
        assert_eq!(config.evaluation.state_interval_secs, 120);
        assert_eq!(config.evaluation.budget_interval_secs, 300);
        assert_eq!(config.budget.window_hours, 24);
        assert_eq!(config.defaults.sleep_hour, 22);
        assert_eq!(config.defaults.wake_hour, 7);
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
[daemon]
bind_addr = "0.0.0.0:9000"

[defaults]
sleep_hour = 23
alert_frequency = "critical-only"
adaptation_mode = "visible"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.daemon.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.daemon.log_level, "info");
        let defaults = config.defaults.to_preference_defaults();
        assert_eq!(defaults.quiet_hours, QuietHours::new(23, 7));
        assert_eq!(defaults.alert_frequency, AlertFrequency::CriticalOnly);
        assert_eq!(defaults.adaptation_mode, AdaptationMode::Visible);
    }

    #[test]
    fn test_invalid_floors_fall_back() {
        let toml_str = r#"
[budget]
domain_floor = 4.0
global_floor = -1.0
window_hours = 0
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        let policy = config.budget.to_policy();
        assert_eq!(policy, BudgetPolicy::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[evaluation]\nstate_interval_secs = 30\n").unwrap();
        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.evaluation.state_interval_secs, 30);
        assert_eq!(loaded.daemon.bind_addr, Config::default().daemon.bind_addr);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_path(dir.path().join("absent.toml")).is_err());
    }
}
