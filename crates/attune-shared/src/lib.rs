//! Shared types and pure decision logic for Attune.
//!
//! Everything here is deterministic and free of I/O: signal aggregation,
//! cognitive state inference, the budget reduction, adaptive UI tokens and
//! notification modality routing. The daemon (`attuned`) wires these to
//! stores, timers and HTTP.

pub mod aggregate;
pub mod budget;
pub mod error;
pub mod inference;
pub mod ledger;
pub mod notification;
pub mod preferences;
pub mod routing;
pub mod signal;
pub mod state;
pub mod tokens;

pub use aggregate::{aggregate, AggregatedFeatures, Aggregation, FeatureSet, MIN_SAMPLE_COUNT};
pub use budget::{budget_state, suggestion, BudgetPolicy, BudgetState, Suggestion, DAILY_CAPACITY};
pub use error::AttuneError;
pub use inference::{evaluate, infer, Baseline};
pub use ledger::{BudgetEntry, BudgetLedger, CognitiveDomain, LedgerSummary};
pub use notification::{
    DispatchRequest, DispatchResponse, NotificationRecord, NotificationRequest, Priority,
};
pub use preferences::{PreferenceDefaults, ResolvedPreferences, UserPreferences};
pub use routing::{
    decide, route_notification, AlertFrequency, Modality, ModalityDecision, QuietHours,
    RoutingContext, RoutingRule,
};
pub use signal::{CognitiveSignal, SignalType};
pub use state::{CognitiveState, CognitiveStateResult, StatePrediction, StateRecord};
pub use tokens::{adaptive_tokens, AdaptationMode, AdaptiveTokens};

/// Crate version, reported by the daemon health endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
