//! Derived task progress

use std::sync::Arc;

use pomosync_domain::{PomoSyncError, Result};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::ports::TaskRepository;
use crate::clock::{Clock, SystemClock};
use crate::session::ports::SessionRepository;

/// Keeps `Task::completed_pomodoros` equal to the number of completed work
/// sessions linked to the task.
pub struct TaskProgressProjector {
    sessions: Arc<dyn SessionRepository>,
    tasks: Arc<dyn TaskRepository>,
    clock: Arc<dyn Clock>,
}

impl TaskProgressProjector {
    pub fn new(sessions: Arc<dyn SessionRepository>, tasks: Arc<dyn TaskRepository>) -> Self {
        Self { sessions, tasks, clock: Arc::new(SystemClock) }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Full recount for `task_id`; safe to run any number of times.
    #[instrument(skip(self))]
    pub async fn recount(&self, task_id: Uuid) -> Result<i64> {
        let count = self.sessions.count_completed_work_sessions(task_id).await?;
        if !self.tasks.set_completed_pomodoros(task_id, count, self.clock.now()).await? {
            return Err(PomoSyncError::not_found("task", &task_id.to_string()));
        }
        debug!(%task_id, completed_pomodoros = count, "task progress recounted");
        Ok(count)
    }
}
