//! Versioned field edits for records outside the session state machine
//!
//! Tasks, notes, reminders and the non-lifecycle fields of sessions are all
//! edited through a [`Patch`]. The patch is applied to a reconciled copy, the
//! copy is validated, then committed by compare-and-swap.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pomosync_domain::types::session::{validate_notes, validate_rating};
use pomosync_domain::{
    DeliveryMethod, Note, PomoSyncError, Reminder, ReminderPriority, ReminderStatus, Result,
    Session, Task, Versioned,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use super::ports::VersionedRepository;
use super::resolver::SyncConflictResolver;
use crate::clock::Clock;
use crate::errors::{MutationError, MutationResult};

/// A client-side edit of a record's mutable fields.
pub trait Patch<R>: Send + Sync {
    fn apply(&self, record: &mut R, now: DateTime<Utc>) -> Result<()>;
}

/// Accepts `submit_field_mutation` calls for one record family.
pub struct FieldMutationService<R, P: ?Sized> {
    repo: Arc<P>,
    resolver: SyncConflictResolver,
    clock: Arc<dyn Clock>,
    _record: PhantomData<fn() -> R>,
}

impl<R, P> FieldMutationService<R, P>
where
    R: Versioned,
    P: VersionedRepository<R> + ?Sized,
{
    pub fn new(repo: Arc<P>, resolver: SyncConflictResolver, clock: Arc<dyn Clock>) -> Self {
        Self { repo, resolver, clock, _record: PhantomData }
    }

    /// Validate and store a new record.
    pub async fn create(&self, record: R) -> Result<R> {
        record.validate()?;
        self.repo.insert(&record).await?;
        info!(kind = %R::KIND, record_id = %record.id(), "record created");
        Ok(record)
    }

    /// Fetch a live (not soft-deleted) record.
    pub async fn get(&self, record_id: Uuid) -> Result<R> {
        match self.repo.get(record_id).await? {
            Some(record) if !record.is_deleted() => Ok(record),
            _ => Err(PomoSyncError::not_found(R::KIND, &record_id.to_string())),
        }
    }

    /// Apply `patch` if `client_version` is still current.
    ///
    /// Soft-deleted records behave as missing.
    #[instrument(skip(self, patch), fields(kind = %R::KIND))]
    pub async fn submit_field_mutation(
        &self,
        record_id: Uuid,
        client_version: i64,
        device_id: &str,
        patch: &(dyn Patch<R> + '_),
    ) -> MutationResult<R> {
        let now = self.clock.now();
        let server = self.get(record_id).await?;

        let reconciled =
            SyncConflictResolver::reconcile(&server, client_version, device_id, now, |record| {
                patch.apply(record, now).map_err(MutationError::from)
            });
        let updated = match reconciled {
            Ok(updated) => updated,
            Err(err) => {
                self.resolver.record_rejection(&err, device_id, now).await;
                return Err(err);
            }
        };

        self.resolver.commit(self.repo.as_ref(), updated, server.sync_version(), device_id, now).await
    }
}

/// Soft delete, valid for every record family.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftDelete;

impl<R: Versioned> Patch<R> for SoftDelete {
    fn apply(&self, record: &mut R, now: DateTime<Utc>) -> Result<()> {
        record.sync_mut().mark_deleted(now);
        Ok(())
    }
}

/// Editable task fields. `completed_pomodoros` is deliberately absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub project_id: Option<Option<Uuid>>,
    pub estimated_pomodoros: Option<Option<i32>>,
    pub is_completed: Option<bool>,
}

impl Patch<Task> for TaskPatch {
    fn apply(&self, task: &mut Task, _now: DateTime<Utc>) -> Result<()> {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(project_id) = self.project_id {
            task.project_id = project_id;
        }
        if let Some(estimate) = self.estimated_pomodoros {
            task.estimated_pomodoros = estimate;
        }
        if let Some(done) = self.is_completed {
            task.is_completed = done;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub task_id: Option<Option<Uuid>>,
    pub is_pinned: Option<bool>,
}

impl Patch<Note> for NotePatch {
    fn apply(&self, note: &mut Note, _now: DateTime<Utc>) -> Result<()> {
        if let Some(title) = &self.title {
            note.title = title.clone();
        }
        if let Some(content) = &self.content {
            note.content = content.clone();
        }
        if let Some(task_id) = self.task_id {
            note.task_id = task_id;
        }
        if let Some(pinned) = self.is_pinned {
            note.is_pinned = pinned;
        }
        Ok(())
    }
}

/// Session fields a client may edit directly.
///
/// Status and lifecycle timestamps only move through the state machine, so
/// they have no representation here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionPatch {
    pub productivity_rating: Option<Option<u8>>,
    pub focus_rating: Option<Option<u8>>,
    pub notes: Option<Option<String>>,
    pub task_id: Option<Option<Uuid>>,
}

impl Patch<Session> for SessionPatch {
    fn apply(&self, session: &mut Session, _now: DateTime<Utc>) -> Result<()> {
        if let Some(rating) = self.productivity_rating {
            validate_rating("productivity_rating", rating)?;
            session.productivity_rating = rating;
        }
        if let Some(rating) = self.focus_rating {
            validate_rating("focus_rating", rating)?;
            session.focus_rating = rating;
        }
        if let Some(notes) = &self.notes {
            validate_notes(notes.as_deref())?;
            session.notes = notes.clone();
        }
        if let Some(task_id) = self.task_id {
            // Finished sessions stay attached to the task they were counted against.
            if session.status.is_terminal() && task_id != session.task_id {
                return Err(PomoSyncError::InvalidInput(
                    "cannot relink a finished session to another task".into(),
                ));
            }
            session.task_id = task_id;
        }
        Ok(())
    }
}

/// Content edits for a reminder that has not been delivered yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReminderPatch {
    pub title: Option<String>,
    pub message: Option<Option<String>>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub priority: Option<ReminderPriority>,
    pub delivery_method: Option<DeliveryMethod>,
}

impl Patch<Reminder> for ReminderPatch {
    fn apply(&self, reminder: &mut Reminder, _now: DateTime<Utc>) -> Result<()> {
        if reminder.status != ReminderStatus::Pending {
            return Err(PomoSyncError::InvalidInput(format!(
                "reminder is {} and can no longer be edited",
                reminder.status
            )));
        }
        if let Some(title) = &self.title {
            reminder.title = title.clone();
        }
        if let Some(message) = &self.message {
            reminder.message = message.clone();
        }
        if let Some(at) = self.scheduled_for {
            reminder.scheduled_for = at;
        }
        if let Some(priority) = self.priority {
            reminder.priority = priority;
        }
        if let Some(method) = self.delivery_method {
            reminder.delivery_method = method;
        }
        Ok(())
    }
}
