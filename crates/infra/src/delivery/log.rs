//! Delivery channel that only writes a log line.
//!
//! Used when no webhook is configured, so reminders still move through
//! their lifecycle in development.

use async_trait::async_trait;
use chrono::Utc;
use pomosync_core::{DeliveryError, DeliveryReceipt, DeliveryTransport};
use pomosync_domain::Reminder;
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

#[async_trait]
impl DeliveryTransport for LogTransport {
    async fn send(&self, reminder: &Reminder) -> Result<DeliveryReceipt, DeliveryError> {
        info!(
            reminder_id = %reminder.id,
            owner_id = %reminder.owner_id,
            title = %reminder.title,
            priority = %reminder.priority,
            delivery_method = %reminder.delivery_method,
            "reminder delivered to log"
        );
        Ok(DeliveryReceipt { provider_id: None, delivered_at: Utc::now() })
    }
}
