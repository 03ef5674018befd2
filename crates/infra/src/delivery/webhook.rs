//! HTTP webhook delivery channel
//!
//! Each delivery is a JSON `POST` carrying an `Idempotency-Key` header built
//! from the reminder id and snooze count. A retry after an ambiguous timeout
//! therefore reuses the key, while a snoozed reminder that fires again gets a
//! fresh one.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pomosync_core::{DeliveryError, DeliveryReceipt, DeliveryTransport};
use pomosync_domain::{PomoSyncError, Reminder, Result};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::errors::InfraError;

const MAX_ERROR_BODY: usize = 256;

/// Body posted to the webhook endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderPayload {
    pub reminder_id: Uuid,
    pub owner_id: Uuid,
    pub task_id: Option<Uuid>,
    pub title: String,
    pub message: Option<String>,
    pub scheduled_for: DateTime<Utc>,
    pub priority: String,
    pub delivery_method: String,
    pub attempt: i32,
}

impl From<&Reminder> for ReminderPayload {
    fn from(reminder: &Reminder) -> Self {
        Self {
            reminder_id: reminder.id,
            owner_id: reminder.owner_id,
            task_id: reminder.task_id,
            title: reminder.title.clone(),
            message: reminder.message.clone(),
            scheduled_for: reminder.scheduled_for,
            priority: reminder.priority.to_string(),
            delivery_method: reminder.delivery_method.to_string(),
            attempt: reminder.retry_count + 1,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WebhookAck {
    id: Option<String>,
}

/// Idempotency key for one logical notification.
pub fn idempotency_key(reminder: &Reminder) -> String {
    format!("{}-{}", reminder.id, reminder.snooze_count)
}

pub struct WebhookTransport {
    client: Client,
    endpoint: Url,
}

impl WebhookTransport {
    /// Build a transport posting to `endpoint`.
    ///
    /// `timeout` bounds each HTTP exchange; the dispatcher applies its own
    /// timeout on top.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| PomoSyncError::Config(format!("Invalid webhook URL {endpoint}: {e}")))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(PomoSyncError::Config(format!(
                "Unsupported webhook scheme: {}",
                endpoint.scheme()
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PomoSyncError::from(InfraError::from(e)))?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl DeliveryTransport for WebhookTransport {
    #[instrument(skip(self, reminder), fields(reminder_id = %reminder.id))]
    async fn send(&self, reminder: &Reminder) -> std::result::Result<DeliveryReceipt, DeliveryError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header("Idempotency-Key", idempotency_key(reminder))
            .json(&ReminderPayload::from(reminder))
            .send()
            .await
            .map_err(|err| {
                let mapped = PomoSyncError::from(InfraError::from(err));
                DeliveryError::Unavailable(mapped.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "webhook rejected reminder");
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                message: truncate(&body, status),
            });
        }

        // An unparseable acknowledgement still counts as delivered.
        let provider_id = response.json::<WebhookAck>().await.ok().and_then(|ack| ack.id);
        debug!(%status, provider_id = provider_id.as_deref().unwrap_or("-"), "webhook accepted reminder");

        Ok(DeliveryReceipt { provider_id, delivered_at: Utc::now() })
    }
}

fn truncate(body: &str, status: StatusCode) -> String {
    if body.trim().is_empty() {
        return status.canonical_reason().unwrap_or("no response body").to_string();
    }
    body.chars().take(MAX_ERROR_BODY).collect()
}
