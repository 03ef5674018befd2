//! Port interfaces for reminder storage and delivery

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pomosync_domain::{Reminder, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sync::ports::VersionedRepository;

#[async_trait]
pub trait ReminderRepository: VersionedRepository<Reminder> {
    /// `pending` reminders with `scheduled_for <= now` and retries left,
    /// highest priority first, then oldest schedule first.
    ///
    /// Soft-deleted reminders and reminders under a live lease are excluded.
    async fn find_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Reminder>>;

    /// `snoozed` reminders with `snoozed_until <= now`, highest priority
    /// first, then earliest wake-up first. Same exclusions as
    /// [`ReminderRepository::find_due`].
    async fn find_snooze_ready(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Reminder>>;
}

/// Proof of a successful hand-off to a delivery channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    /// Identifier assigned by the downstream provider, if any.
    pub provider_id: Option<String>,
    pub delivered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("delivery rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("delivery channel unavailable: {0}")]
    Unavailable(String),

    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
}

/// Outbound channel that actually notifies the user.
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    async fn send(&self, reminder: &Reminder) -> std::result::Result<DeliveryReceipt, DeliveryError>;
}
