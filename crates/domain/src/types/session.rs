//! Timed work/break sessions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::versioned::{EntityKind, SyncMetadata};
use crate::constants::{
    MAX_INTERRUPTIONS, MAX_NOTES_LENGTH, MAX_PLANNED_DURATION_SECS, MAX_RATING,
    MIN_PLANNED_DURATION_SECS, MIN_RATING,
};
use crate::errors::{PomoSyncError, Result};
use crate::{impl_domain_status_conversions, impl_versioned};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Work,
    ShortBreak,
    LongBreak,
}

impl_domain_status_conversions!(SessionType {
    Work => "work",
    ShortBreak => "short_break",
    LongBreak => "long_break",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Planned,
    Active,
    Paused,
    Completed,
    Cancelled,
    Interrupted,
}

impl_domain_status_conversions!(SessionStatus {
    Planned => "planned",
    Active => "active",
    Paused => "paused",
    Completed => "completed",
    Cancelled => "cancelled",
    Interrupted => "interrupted",
});

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Active or paused: counts against the one-open-session-per-owner rule.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Active | Self::Paused)
    }
}

/// A pomodoro timer session.
///
/// Lifecycle timestamps are written only by the state machine; there is no
/// setter for them on any mutation surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub task_id: Option<Uuid>,
    pub session_type: SessionType,
    pub status: SessionStatus,
    pub planned_duration_secs: i64,
    pub remaining_secs: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub resumed_at: Option<DateTime<Utc>>,
    pub interrupted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub actual_duration_secs: Option<i64>,
    pub interruption_count: i32,
    #[serde(default)]
    pub interruption_notes: Vec<String>,
    pub productivity_rating: Option<u8>,
    pub focus_rating: Option<u8>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sync: SyncMetadata,
}

impl_versioned!(Session, EntityKind::Session);

/// Caller-supplied fields for a new session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSession {
    pub owner_id: Uuid,
    pub task_id: Option<Uuid>,
    pub session_type: SessionType,
    pub planned_duration_secs: i64,
    pub notes: Option<String>,
    pub device_id: Option<String>,
}

impl Session {
    /// Build a `planned` session. Validation is left to [`Session::validate`].
    pub fn plan(input: NewSession, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            owner_id: input.owner_id,
            task_id: input.task_id,
            session_type: input.session_type,
            status: SessionStatus::Planned,
            planned_duration_secs: input.planned_duration_secs,
            remaining_secs: input.planned_duration_secs,
            started_at: None,
            paused_at: None,
            resumed_at: None,
            interrupted_at: None,
            completed_at: None,
            cancelled_at: None,
            actual_duration_secs: None,
            interruption_count: 0,
            interruption_notes: Vec::new(),
            productivity_rating: None,
            focus_rating: None,
            notes: input.notes,
            created_at: now,
            sync: SyncMetadata::new(input.device_id, now),
        }
    }

    /// Field-level bounds checks.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_PLANNED_DURATION_SECS..=MAX_PLANNED_DURATION_SECS)
            .contains(&self.planned_duration_secs)
        {
            return Err(PomoSyncError::InvalidInput(format!(
                "planned duration must be between {MIN_PLANNED_DURATION_SECS} and \
                 {MAX_PLANNED_DURATION_SECS} seconds, got {}",
                self.planned_duration_secs
            )));
        }
        if self.remaining_secs < 0 || self.remaining_secs > self.planned_duration_secs {
            return Err(PomoSyncError::InvalidInput(format!(
                "remaining time {} outside 0..={}",
                self.remaining_secs, self.planned_duration_secs
            )));
        }
        if !(0..=MAX_INTERRUPTIONS).contains(&self.interruption_count) {
            return Err(PomoSyncError::InvalidInput(format!(
                "interruption count must be between 0 and {MAX_INTERRUPTIONS}"
            )));
        }
        validate_rating("productivity_rating", self.productivity_rating)?;
        validate_rating("focus_rating", self.focus_rating)?;
        validate_notes(self.notes.as_deref())?;
        Ok(())
    }
}

pub fn validate_rating(field: &str, rating: Option<u8>) -> Result<()> {
    match rating {
        Some(value) if !(MIN_RATING..=MAX_RATING).contains(&value) => {
            Err(PomoSyncError::InvalidInput(format!(
                "{field} must be between {MIN_RATING} and {MAX_RATING}, got {value}"
            )))
        }
        _ => Ok(()),
    }
}

pub fn validate_notes(notes: Option<&str>) -> Result<()> {
    match notes {
        Some(text) if text.chars().count() > MAX_NOTES_LENGTH => Err(PomoSyncError::InvalidInput(
            format!("notes cannot exceed {MAX_NOTES_LENGTH} characters"),
        )),
        _ => Ok(()),
    }
}
