//! Store abstractions for the collaborators the engine reads and writes.
//!
//! Each store is a trait so the daemon can run against the hosted platform
//! in production and against the in-memory implementations below in tests
//! and single-node deployments. All stores are append-oriented: signals,
//! state history and ledger entries are never rewritten. Signals and state
//! history may be pruned once they fall out of every read window.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use attune_shared::{
    AttuneError, BudgetEntry, BudgetLedger, CognitiveSignal, LedgerSummary, NotificationRecord,
    StateRecord, UserPreferences,
};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

// ============================================================================
// Traits
// ============================================================================

/// Read side of the behavioral signal log.
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Signals recorded at or after `since`
    async fn fetch_signals(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<CognitiveSignal>, AttuneError>;

    /// Append readings from instrumentation, returns how many were stored
    async fn append_signals(
        &self,
        user_id: &str,
        signals: Vec<CognitiveSignal>,
    ) -> Result<usize, AttuneError>;

    /// Drop signals recorded before `cutoff`, returns how many went
    async fn prune_before(&self, user_id: &str, cutoff: DateTime<Utc>)
        -> Result<usize, AttuneError>;
}

/// Immutable history of evaluation results.
#[async_trait]
pub trait StateHistory: Send + Sync {
    async fn append_state_result(&self, user_id: &str, record: StateRecord)
        -> Result<(), AttuneError>;

    /// Records evaluated at or after `since`, oldest first
    async fn records_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<StateRecord>, AttuneError>;

    async fn latest(&self, user_id: &str) -> Result<Option<StateRecord>, AttuneError>;

    /// Drop records evaluated before `cutoff`, returns how many went
    async fn prune_before(&self, user_id: &str, cutoff: DateTime<Utc>)
        -> Result<usize, AttuneError>;
}

/// Append-only budget entries.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn append(&self, user_id: &str, entry: BudgetEntry) -> Result<(), AttuneError>;

    async fn entries_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<BudgetEntry>, AttuneError>;

    async fn summary(&self, user_id: &str) -> Result<LedgerSummary, AttuneError>;
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<UserPreferences>, AttuneError>;

    async fn put(&self, user_id: &str, preferences: UserPreferences) -> Result<(), AttuneError>;
}

/// Notification records with their modality tag.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, record: NotificationRecord) -> Result<(), AttuneError>;

    /// Returns false when no record has that id
    async fn mark_delivered(
        &self,
        user_id: &str,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, AttuneError>;

    async fn list(&self, user_id: &str) -> Result<Vec<NotificationRecord>, AttuneError>;

    /// Deferred records not yet delivered, oldest first
    async fn pending(&self, user_id: &str) -> Result<Vec<NotificationRecord>, AttuneError> {
        Ok(self
            .list(user_id)
            .await?
            .into_iter()
            .filter(NotificationRecord::is_pending)
            .collect())
    }
}

// ============================================================================
// In-memory implementations
// ============================================================================

#[derive(Default)]
pub struct InMemorySignalStore {
    signals: RwLock<HashMap<String, Vec<CognitiveSignal>>>,
}

impl InMemorySignalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SignalStore for InMemorySignalStore {
    async fn fetch_signals(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<CognitiveSignal>, AttuneError> {
        let signals = self.signals.read().await;
        Ok(signals
            .get(user_id)
            .map(|all| all.iter().filter(|s| s.timestamp >= since).cloned().collect())
            .unwrap_or_default())
    }

    async fn append_signals(
        &self,
        user_id: &str,
        signals: Vec<CognitiveSignal>,
    ) -> Result<usize, AttuneError> {
        let count = signals.len();
        self.signals
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .extend(signals);
        Ok(count)
    }

    async fn prune_before(
        &self,
        user_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, AttuneError> {
        let mut signals = self.signals.write().await;
        let Some(all) = signals.get_mut(user_id) else {
            return Ok(0);
        };
        let before = all.len();
        all.retain(|s| s.timestamp >= cutoff);
        Ok(before - all.len())
    }
}

#[derive(Default)]
pub struct InMemoryStateHistory {
    records: RwLock<HashMap<String, Vec<StateRecord>>>,
}

impl InMemoryStateHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateHistory for InMemoryStateHistory {
    async fn append_state_result(
        &self,
        user_id: &str,
        record: StateRecord,
    ) -> Result<(), AttuneError> {
        self.records
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn records_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<StateRecord>, AttuneError> {
        let records = self.records.read().await;
        let mut out: Vec<StateRecord> = records
            .get(user_id)
            .map(|all| all.iter().filter(|r| r.evaluated_at >= since).cloned().collect())
            .unwrap_or_default();
        out.sort_by_key(|r| r.evaluated_at);
        Ok(out)
    }

    async fn latest(&self, user_id: &str) -> Result<Option<StateRecord>, AttuneError> {
        let records = self.records.read().await;
        Ok(records
            .get(user_id)
            .and_then(|all| all.iter().max_by_key(|r| r.evaluated_at).cloned()))
    }

    async fn prune_before(
        &self,
        user_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, AttuneError> {
        let mut records = self.records.write().await;
        let Some(all) = records.get_mut(user_id) else {
            return Ok(0);
        };
        let before = all.len();
        all.retain(|r| r.evaluated_at >= cutoff);
        Ok(before - all.len())
    }
}

#[derive(Default)]
pub struct InMemoryLedgerStore {
    ledgers: RwLock<HashMap<String, BudgetLedger>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn append(&self, user_id: &str, entry: BudgetEntry) -> Result<(), AttuneError> {
        self.ledgers
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .append(entry);
        Ok(())
    }

    async fn entries_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<BudgetEntry>, AttuneError> {
        let ledgers = self.ledgers.read().await;
        Ok(ledgers
            .get(user_id)
            .map(|l| {
                l.entries()
                    .iter()
                    .filter(|e| e.timestamp >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn summary(&self, user_id: &str) -> Result<LedgerSummary, AttuneError> {
        let ledgers = self.ledgers.read().await;
        Ok(ledgers.get(user_id).map(|l| l.summary()).unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryPreferenceStore {
    preferences: RwLock<HashMap<String, UserPreferences>>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for InMemoryPreferenceStore {
    async fn get(&self, user_id: &str) -> Result<Option<UserPreferences>, AttuneError> {
        Ok(self.preferences.read().await.get(user_id).cloned())
    }

    async fn put(&self, user_id: &str, preferences: UserPreferences) -> Result<(), AttuneError> {
        self.preferences
            .write()
            .await
            .insert(user_id.to_string(), preferences);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryNotificationStore {
    records: RwLock<HashMap<String, Vec<NotificationRecord>>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn insert(&self, record: NotificationRecord) -> Result<(), AttuneError> {
        self.records
            .write()
            .await
            .entry(record.user_id.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn mark_delivered(
        &self,
        user_id: &str,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, AttuneError> {
        let mut records = self.records.write().await;
        let Some(record) = records
            .get_mut(user_id)
            .and_then(|all| all.iter_mut().find(|r| r.id == id))
        else {
            return Ok(false);
        };
        record.delivered = true;
        record.delivered_at = Some(at);
        Ok(true)
    }

    async fn list(&self, user_id: &str) -> Result<Vec<NotificationRecord>, AttuneError> {
        Ok(self
            .records
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}

// ============================================================================
// Bundle
// ============================================================================

/// Every store the daemon needs, behind trait objects.
#[derive(Clone)]
pub struct Stores {
    pub signals: Arc<dyn SignalStore>,
    pub history: Arc<dyn StateHistory>,
    pub ledger: Arc<dyn LedgerStore>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub notifications: Arc<dyn NotificationStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            signals: Arc::new(InMemorySignalStore::new()),
            history: Arc::new(InMemoryStateHistory::new()),
            ledger: Arc::new(InMemoryLedgerStore::new()),
            preferences: Arc::new(InMemoryPreferenceStore::new()),
            notifications: Arc::new(InMemoryNotificationStore::new()),
        }
    }
}
