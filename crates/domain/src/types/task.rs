//! Tasks and their pomodoro counters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::versioned::{EntityKind, SyncMetadata};
use crate::errors::{PomoSyncError, Result};
use crate::impl_versioned;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub project_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub estimated_pomodoros: Option<i32>,
    /// Derived from completed work sessions; clients never write it.
    pub completed_pomodoros: i32,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub sync: SyncMetadata,
}

impl_versioned!(Task, EntityKind::Task);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub owner_id: Uuid,
    pub project_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub estimated_pomodoros: Option<i32>,
    pub device_id: Option<String>,
}

impl Task {
    pub fn create(input: NewTask, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            owner_id: input.owner_id,
            project_id: input.project_id,
            title: input.title,
            description: input.description,
            estimated_pomodoros: input.estimated_pomodoros,
            completed_pomodoros: 0,
            is_completed: false,
            created_at: now,
            sync: SyncMetadata::new(input.device_id, now),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(PomoSyncError::InvalidInput("task title is required".into()));
        }
        if matches!(self.estimated_pomodoros, Some(n) if n < 0) {
            return Err(PomoSyncError::InvalidInput(
                "estimated_pomodoros cannot be negative".into(),
            ));
        }
        Ok(())
    }
}
