//! Notification requests, dispatch wire types and persisted records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AttuneError;
use crate::routing::{Modality, RoutingRule};

/// Message priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

/// A validated notification ready for routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl NotificationRequest {
    pub fn new(user_id: &str, title: &str, message: &str, priority: Priority) -> Self {
        Self {
            user_id: user_id.to_string(),
            title: title.to_string(),
            message: message.to_string(),
            notification_type: DEFAULT_NOTIFICATION_TYPE.to_string(),
            priority,
            action_url: None,
            data: None,
        }
    }
}

const DEFAULT_NOTIFICATION_TYPE: &str = "general";

/// Body of the dispatch endpoint, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "type")]
    pub notification_type: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub action_url: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

fn required(field: Option<String>, name: &str) -> Result<String, AttuneError> {
    match field {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AttuneError::InvalidRequest(format!("{} is required", name))),
    }
}

impl DispatchRequest {
    /// `userId` and `title` must be present and non-blank.
    pub fn validate(self) -> Result<NotificationRequest, AttuneError> {
        let user_id = required(self.user_id, "userId")?;
        let title = required(self.title, "title")?;
        Ok(NotificationRequest {
            user_id,
            title,
            message: self.message.unwrap_or_default(),
            notification_type: self
                .notification_type
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_NOTIFICATION_TYPE.to_string()),
            priority: self.priority.unwrap_or_default(),
            action_url: self.action_url,
            data: self.data,
        })
    }
}

/// Body returned by the dispatch endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResponse {
    pub success: bool,
    pub notification_id: Uuid,
    pub modality: Modality,
    pub delivered: bool,
}

/// Persisted notification with its routing tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: Uuid,
    pub user_id: String,
    pub request: NotificationRequest,
    pub modality: Modality,
    pub rule: RoutingRule,
    pub delivered: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
}

impl NotificationRecord {
    pub fn new(request: NotificationRequest, modality: Modality, rule: RoutingRule) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: request.user_id.clone(),
            request,
            modality,
            rule,
            delivered: false,
            created_at: Utc::now(),
            delivered_at: None,
        }
    }

    /// Deferred and still waiting for conditions to change.
    pub fn is_pending(&self) -> bool {
        self.modality == Modality::Batch && !self.delivered
    }
}
