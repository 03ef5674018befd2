//! Reminders delivered by the background dispatcher

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::versioned::{EntityKind, SyncMetadata};
use crate::constants::{DEFAULT_MAX_RETRIES, DEFAULT_MAX_SNOOZES};
use crate::errors::{PomoSyncError, Result};
use crate::{impl_domain_status_conversions, impl_versioned};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    Pending,
    Sent,
    Dismissed,
    Snoozed,
    Failed,
}

impl_domain_status_conversions!(ReminderStatus {
    Pending => "pending",
    Sent => "sent",
    Dismissed => "dismissed",
    Snoozed => "snoozed",
    Failed => "failed",
});

impl ReminderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Dismissed)
    }

    /// Statuses from which a delivery attempt may be recorded.
    pub fn is_deliverable(self) -> bool {
        matches!(self, Self::Pending | Self::Snoozed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    Push,
    Email,
    Sms,
    InApp,
}

impl_domain_status_conversions!(DeliveryMethod {
    Push => "push",
    Email => "email",
    Sms => "sms",
    InApp => "in_app",
});

/// Priority, ordered low to urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl_domain_status_conversions!(ReminderPriority {
    Low => "low",
    Normal => "normal",
    High => "high",
    Urgent => "urgent",
});

impl ReminderPriority {
    /// Numeric rank used for storage ordering.
    pub fn rank(self) -> i64 {
        match self {
            Self::Low => 0,
            Self::Normal => 1,
            Self::High => 2,
            Self::Urgent => 3,
        }
    }

    pub fn from_rank(rank: i64) -> Option<Self> {
        match rank {
            0 => Some(Self::Low),
            1 => Some(Self::Normal),
            2 => Some(Self::High),
            3 => Some(Self::Urgent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub task_id: Option<Uuid>,
    pub title: String,
    pub message: Option<String>,
    pub scheduled_for: DateTime<Utc>,
    pub status: ReminderStatus,
    pub delivery_method: DeliveryMethod,
    pub priority: ReminderPriority,
    pub retry_count: i32,
    pub max_retries: i32,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub snoozed_until: Option<DateTime<Utc>>,
    pub snooze_count: i32,
    pub max_snoozes: i32,
    pub sent_at: Option<DateTime<Utc>>,
    pub dismissed_at: Option<DateTime<Utc>>,
    pub recurrence_rule_id: Option<Uuid>,
    /// Dispatcher currently holding this reminder.
    pub lease_owner: Option<String>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub sync: SyncMetadata,
}

impl_versioned!(Reminder, EntityKind::Reminder);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReminder {
    pub owner_id: Uuid,
    pub task_id: Option<Uuid>,
    pub title: String,
    pub message: Option<String>,
    pub scheduled_for: DateTime<Utc>,
    pub delivery_method: DeliveryMethod,
    pub priority: ReminderPriority,
    pub max_retries: Option<i32>,
    pub max_snoozes: Option<i32>,
    pub recurrence_rule_id: Option<Uuid>,
    pub device_id: Option<String>,
}

impl Reminder {
    pub fn schedule(input: NewReminder, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            owner_id: input.owner_id,
            task_id: input.task_id,
            title: input.title,
            message: input.message,
            scheduled_for: input.scheduled_for,
            status: ReminderStatus::Pending,
            delivery_method: input.delivery_method,
            priority: input.priority,
            retry_count: 0,
            max_retries: input.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            last_retry_at: None,
            failure_reason: None,
            snoozed_until: None,
            snooze_count: 0,
            max_snoozes: input.max_snoozes.unwrap_or(DEFAULT_MAX_SNOOZES),
            sent_at: None,
            dismissed_at: None,
            recurrence_rule_id: input.recurrence_rule_id,
            lease_owner: None,
            lease_expires_at: None,
            created_at: now,
            sync: SyncMetadata::new(input.device_id, now),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(PomoSyncError::InvalidInput("reminder title is required".into()));
        }
        if self.max_retries < 1 {
            return Err(PomoSyncError::InvalidInput("max_retries must be at least 1".into()));
        }
        if self.max_snoozes < 0 {
            return Err(PomoSyncError::InvalidInput("max_snoozes cannot be negative".into()));
        }
        if !(0..=self.max_retries).contains(&self.retry_count) {
            return Err(PomoSyncError::InvalidInput(format!(
                "retry_count {} outside 0..={}",
                self.retry_count, self.max_retries
            )));
        }
        Ok(())
    }

    /// True while another dispatcher's lease is still live at `now`.
    pub fn is_leased_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.lease_expires_at, Some(expires) if expires > now)
    }

    pub fn clear_lease(&mut self) {
        self.lease_owner = None;
        self.lease_expires_at = None;
    }

    pub fn can_snooze(&self) -> bool {
        matches!(self.status, ReminderStatus::Pending | ReminderStatus::Sent)
            && self.snooze_count < self.max_snoozes
    }
}
