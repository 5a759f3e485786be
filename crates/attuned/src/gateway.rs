//! Delivery gateway - hands routed notifications to a transport
//!
//! The engine never talks to push services directly. It decides a modality
//! and hands the notification to a gateway. Transport retries and timeouts
//! live behind this seam.

use async_trait::async_trait;
use attune_shared::{AttuneError, Modality, NotificationRequest};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::info;

/// Result of handing one notification to a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub delivered: bool,
}

/// Trait for delivery transports - allows mocking in tests
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    /// Deliver through `modality`. Only immediate modalities are passed here.
    async fn deliver(
        &self,
        user_id: &str,
        request: &NotificationRequest,
        modality: Modality,
    ) -> Result<DeliveryOutcome, AttuneError>;
}

/// Default gateway: in-app notifications are served from the notification
/// store, so delivering one only means recording that it went out.
/// Push is reported as delivered once logged; a real push transport
/// replaces this gateway in deployments that have one.
pub struct LoggingGateway;

#[async_trait]
impl DeliveryGateway for LoggingGateway {
    async fn deliver(
        &self,
        user_id: &str,
        request: &NotificationRequest,
        modality: Modality,
    ) -> Result<DeliveryOutcome, AttuneError> {
        info!(
            "  Delivered {} notification to {} via {}: {}",
            request.notification_type, user_id, modality, request.title
        );
        Ok(DeliveryOutcome { delivered: true })
    }
}

/// Fake gateway for testing - records deliveries and can be told to fail
#[derive(Default)]
pub struct FakeDeliveryGateway {
    failing: AtomicBool,
    deliveries: Mutex<Vec<(String, String, Modality)>>,
}

impl FakeDeliveryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway that is unavailable from the start
    pub fn failing() -> Self {
        let gateway = Self::default();
        gateway.set_failing(true);
        gateway
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// (user, title, modality) in delivery order
    pub fn deliveries(&self) -> Vec<(String, String, Modality)> {
        self.deliveries
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DeliveryGateway for FakeDeliveryGateway {
    async fn deliver(
        &self,
        user_id: &str,
        request: &NotificationRequest,
        modality: Modality,
    ) -> Result<DeliveryOutcome, AttuneError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AttuneError::GatewayUnavailable(
                "fake gateway is offline".to_string(),
            ));
        }
        if let Ok(mut d) = self.deliveries.lock() {
            d.push((user_id.to_string(), request.title.clone(), modality));
        }
        Ok(DeliveryOutcome { delivered: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attune_shared::Priority;

    #[tokio::test]
    async fn test_fake_gateway_records() {
        let gateway = FakeDeliveryGateway::new();
        let req = NotificationRequest::new("u1", "Deploy done", "", Priority::Normal);
        let outcome = gateway.deliver("u1", &req, Modality::InApp).await.unwrap();
        assert!(outcome.delivered);
        assert_eq!(
            gateway.deliveries(),
            vec![("u1".to_string(), "Deploy done".to_string(), Modality::InApp)]
        );
    }

    #[tokio::test]
    async fn test_fake_gateway_failure_switch() {
        let gateway = FakeDeliveryGateway::failing();
        let req = NotificationRequest::new("u1", "x", "", Priority::High);
        let err = gateway.deliver("u1", &req, Modality::Push).await.unwrap_err();
        assert!(err.is_transient());

        gateway.set_failing(false);
        assert!(gateway.deliver("u1", &req, Modality::Push).await.is_ok());
    }

    #[tokio::test]
    async fn test_logging_gateway_delivers() {
        let req = NotificationRequest::new("u1", "x", "", Priority::Low);
        let outcome = LoggingGateway.deliver("u1", &req, Modality::InApp).await.unwrap();
        assert!(outcome.delivered);
    }
}
