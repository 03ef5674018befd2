use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::versioned::{EntityKind, SyncMetadata};
use crate::errors::{PomoSyncError, Result};
use crate::impl_versioned;

/// Free-form note, optionally attached to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub task_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    pub is_pinned: bool,
    pub created_at: DateTime<Utc>,
    pub sync: SyncMetadata,
}

impl_versioned!(Note, EntityKind::Note);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNote {
    pub owner_id: Uuid,
    pub task_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    pub device_id: Option<String>,
}

impl Note {
    pub fn create(input: NewNote, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            owner_id: input.owner_id,
            task_id: input.task_id,
            title: input.title,
            content: input.content,
            is_pinned: false,
            created_at: now,
            sync: SyncMetadata::new(input.device_id, now),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(PomoSyncError::InvalidInput("note title is required".into()));
        }
        Ok(())
    }
}
