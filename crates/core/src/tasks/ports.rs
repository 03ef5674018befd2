//! Port interfaces for tasks and notes

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pomosync_domain::{Note, Result, Task};
use uuid::Uuid;

use crate::sync::ports::VersionedRepository;

#[async_trait]
pub trait TaskRepository: VersionedRepository<Task> {
    /// Overwrite the derived pomodoro counter and move `last_synced_at` to
    /// `touched_at` so the next pull carries it.
    ///
    /// Leaves `sync_version` alone: the counter is server-derived and must
    /// not invalidate a client's pending edit. Returns `false` if the task
    /// does not exist.
    async fn set_completed_pomodoros(
        &self,
        task_id: Uuid,
        count: i64,
        touched_at: DateTime<Utc>,
    ) -> Result<bool>;
}

/// Notes need nothing beyond versioned storage.
pub trait NoteRepository: VersionedRepository<Note> {}
