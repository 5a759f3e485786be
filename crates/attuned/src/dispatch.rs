//! Notification dispatch
//!
//! Flow for one request:
//! 1. Build the routing context (state, preferences, wall-clock hour)
//! 2. Decide the modality; the decision is complete before any side effect
//! 3. Persist the record with its modality tag
//! 4. Hand immediate modalities to the gateway
//!
//! Gateway failures are reported as `delivered: false` and logged. The
//! record is already stored at that point, so only the transport is lost.
//! Deferred (batch) records are re-routed by `flush_deferred` after each
//! state evaluation. Only records younger than `DEFERRED_MAX_AGE_HOURS` are
//! re-routed, at most `MAX_FLUSH_BATCH` per pass, oldest first. Older ones
//! stay in the digest.

use attune_shared::{
    route_notification, AttuneError, DispatchResponse, Modality, NotificationRecord,
    NotificationRequest, RoutingContext,
};
use chrono::{Duration, Local, Timelike, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::engine::CognitiveEngine;
use crate::gateway::DeliveryGateway;

/// Deferred records older than this are no longer re-routed
pub const DEFERRED_MAX_AGE_HOURS: i64 = 24;

/// Upper bound on records re-routed in one flush
pub const MAX_FLUSH_BATCH: usize = 100;

/// Routes, persists and delivers notifications
pub struct Dispatcher {
    engine: Arc<CognitiveEngine>,
    gateway: Arc<dyn DeliveryGateway>,
}

impl Dispatcher {
    pub fn new(engine: Arc<CognitiveEngine>, gateway: Arc<dyn DeliveryGateway>) -> Self {
        Self { engine, gateway }
    }

    /// Dispatch using the daemon's local wall-clock hour.
    pub async fn dispatch(&self, request: NotificationRequest) -> Result<DispatchResponse, AttuneError> {
        self.dispatch_at_hour(request, Local::now().hour()).await
    }

    pub async fn dispatch_at_hour(
        &self,
        request: NotificationRequest,
        current_hour: u32,
    ) -> Result<DispatchResponse, AttuneError> {
        let ctx = self
            .engine
            .routing_context(&request.user_id, Utc::now(), current_hour)
            .await;
        let decision = route_notification(&request, &ctx);
        info!(
            "  Routing {:?} notification for {} in {}: {} ({:?})",
            request.priority, request.user_id, ctx.state, decision.modality, decision.rule
        );

        let record = NotificationRecord::new(request, decision.modality, decision.rule);
        let notification_id = record.id;
        self.engine
            .stores()
            .notifications
            .insert(record.clone())
            .await?;

        let delivered = if decision.modality.is_immediate() {
            self.deliver(&record).await
        } else {
            false
        };

        Ok(DispatchResponse {
            success: true,
            notification_id,
            modality: decision.modality,
            delivered,
        })
    }

    /// Re-route deferred records under the current context. Returns how
    /// many were delivered.
    pub async fn flush_deferred(&self, user_id: &str) -> Result<usize, AttuneError> {
        self.flush_deferred_at_hour(user_id, Local::now().hour()).await
    }

    pub async fn flush_deferred_at_hour(
        &self,
        user_id: &str,
        current_hour: u32,
    ) -> Result<usize, AttuneError> {
        let cutoff = Utc::now() - Duration::hours(DEFERRED_MAX_AGE_HOURS);
        let pending: Vec<NotificationRecord> = self
            .engine
            .stores()
            .notifications
            .pending(user_id)
            .await?
            .into_iter()
            .filter(|r| r.created_at >= cutoff)
            .take(MAX_FLUSH_BATCH)
            .collect();
        if pending.is_empty() {
            return Ok(0);
        }

        let ctx = self
            .engine
            .routing_context(user_id, Utc::now(), current_hour)
            .await;
        let mut delivered = 0;
        for record in pending {
            if self.redeliver(&record, &ctx).await {
                delivered += 1;
            }
        }

        if delivered > 0 {
            info!("  Flushed {} deferred notifications for {}", delivered, user_id);
        }
        Ok(delivered)
    }

    async fn redeliver(&self, record: &NotificationRecord, ctx: &RoutingContext) -> bool {
        let decision = route_notification(&record.request, ctx);
        if !decision.modality.is_immediate() {
            debug!("  {} still deferred ({:?})", record.id, decision.rule);
            return false;
        }
        let retry = NotificationRecord {
            modality: decision.modality,
            ..record.clone()
        };
        self.deliver(&retry).await
    }

    /// Gateway call plus bookkeeping. Failure only clears `delivered`.
    async fn deliver(&self, record: &NotificationRecord) -> bool {
        let outcome = self
            .gateway
            .deliver(&record.user_id, &record.request, record.modality)
            .await;

        match outcome {
            Ok(o) if o.delivered => {
                if let Err(e) = self
                    .engine
                    .stores()
                    .notifications
                    .mark_delivered(&record.user_id, record.id, Utc::now())
                    .await
                {
                    warn!("  Could not mark {} delivered: {}", record.id, e);
                }
                true
            }
            Ok(_) => {
                warn!("  Delivery not confirmed for {}", record.id);
                false
            }
            Err(e) => {
                warn!(
                    "  Delivery not confirmed for {} (transient: {}): {}",
                    record.id,
                    e.is_transient(),
                    e
                );
                false
            }
        }
    }

    /// Silent records plus anything still deferred, oldest first.
    pub async fn digest(&self, user_id: &str) -> Result<Vec<NotificationRecord>, AttuneError> {
        let mut records: Vec<NotificationRecord> = self
            .engine
            .stores()
            .notifications
            .list(user_id)
            .await?
            .into_iter()
            .filter(|r| r.modality == Modality::Silent || r.is_pending())
            .collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }
}
