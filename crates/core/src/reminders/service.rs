//! Reminder use cases
//!
//! User actions (snooze, dismiss) follow the client version discipline of
//! every other mutation. Dispatcher outcomes (mark_sent, mark_failed) are
//! written against the version their claim produced: any write that landed
//! after the claim, a user snooze or another worker's re-claim, makes the
//! outcome a no-op.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use pomosync_domain::{NewReminder, PomoSyncError, Reminder, Result, Versioned};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::lifecycle::{self, FailureOutcome, Handled};
use super::ports::ReminderRepository;
use crate::clock::Clock;
use crate::errors::{MutationError, MutationResult};
use crate::sync::resolver::SyncConflictResolver;

/// Device id stamped on writes made by the background dispatcher.
pub const DISPATCHER_DEVICE_ID: &str = "pomosync-dispatcher";

pub struct ReminderService {
    reminders: Arc<dyn ReminderRepository>,
    resolver: SyncConflictResolver,
    clock: Arc<dyn Clock>,
}

impl ReminderService {
    pub fn new(reminders: Arc<dyn ReminderRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { reminders, resolver: SyncConflictResolver::new(), clock }
    }

    pub fn with_resolver(mut self, resolver: SyncConflictResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    #[instrument(skip(self, input), fields(owner_id = %input.owner_id))]
    pub async fn create_reminder(&self, input: NewReminder) -> Result<Reminder> {
        let reminder = Reminder::schedule(input, self.clock.now());
        reminder.validate()?;
        self.reminders.insert(&reminder).await?;
        info!(
            reminder_id = %reminder.id,
            scheduled_for = %reminder.scheduled_for,
            priority = %reminder.priority,
            "reminder scheduled"
        );
        Ok(reminder)
    }

    pub async fn get_reminder(&self, reminder_id: Uuid) -> Result<Reminder> {
        match self.reminders.get(reminder_id).await? {
            Some(reminder) if !reminder.is_deleted() => Ok(reminder),
            _ => Err(PomoSyncError::not_found("reminder", &reminder_id.to_string())),
        }
    }

    pub async fn due_reminders(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Reminder>> {
        self.reminders.find_due(now, limit).await
    }

    pub async fn snooze_ready_reminders(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reminder>> {
        self.reminders.find_snooze_ready(now, limit).await
    }

    /// Lease `reminder` to `worker_id`.
    ///
    /// Returns `None` if the reminder is no longer dispatchable or another
    /// dispatcher claimed it first.
    pub async fn claim(
        &self,
        reminder: &Reminder,
        worker_id: &str,
        lease: Duration,
    ) -> Result<Option<Reminder>> {
        let now = self.clock.now();
        let mut claimed = reminder.clone();
        if !lifecycle::claim(&mut claimed, worker_id, now, lease) {
            return Ok(None);
        }
        SyncConflictResolver::stamp(&mut claimed, DISPATCHER_DEVICE_ID, now);

        if self.reminders.compare_and_swap(&claimed, reminder.sync_version()).await? {
            debug!(reminder_id = %claimed.id, worker_id, "reminder claimed");
            Ok(Some(claimed))
        } else {
            debug!(reminder_id = %reminder.id, worker_id, "claim lost to a concurrent writer");
            Ok(None)
        }
    }

    /// Record a successful delivery of `claimed` and release the lease.
    ///
    /// `claimed` must be the record returned by [`ReminderService::claim`].
    #[instrument(skip(self, claimed), fields(reminder_id = %claimed.id))]
    pub async fn mark_sent(&self, claimed: &Reminder) -> Result<Handled<Reminder>> {
        let outcome = self
            .settle_claim(claimed, |reminder, now| lifecycle::mark_sent(reminder, now).then_some(()))
            .await?;

        match outcome {
            ClaimOutcome::Applied(reminder, ()) => {
                info!(reminder_id = %reminder.id, "reminder sent");
                Ok(Handled::Applied(reminder))
            }
            ClaimOutcome::Superseded(reminder) => Ok(Handled::AlreadyHandled(reminder)),
        }
    }

    /// Record a failed delivery attempt of `claimed` and release the lease.
    #[instrument(skip(self, claimed, reason), fields(reminder_id = %claimed.id))]
    pub async fn mark_failed(&self, claimed: &Reminder, reason: &str) -> Result<FailureOutcome> {
        let outcome = self
            .settle_claim(claimed, |reminder, now| match lifecycle::mark_failed(reminder, reason, now) {
                FailureOutcome::AlreadyHandled => None,
                applied => Some(applied),
            })
            .await?;

        match outcome {
            ClaimOutcome::Applied(reminder, result) => {
                match result {
                    FailureOutcome::Exhausted { retry_count } => warn!(
                        reminder_id = %reminder.id,
                        retry_count,
                        reason = reminder.failure_reason.as_deref().unwrap_or_default(),
                        "reminder retries exhausted"
                    ),
                    _ => info!(
                        reminder_id = %reminder.id,
                        retry_count = reminder.retry_count,
                        max_retries = reminder.max_retries,
                        "reminder delivery failed, will retry"
                    ),
                }
                Ok(result)
            }
            ClaimOutcome::Superseded(_) => Ok(FailureOutcome::AlreadyHandled),
        }
    }

    /// User snooze, guarded by the client's `sync_version`.
    #[instrument(skip(self))]
    pub async fn snooze_reminder(
        &self,
        reminder_id: Uuid,
        client_version: i64,
        device_id: &str,
        until: DateTime<Utc>,
    ) -> MutationResult<Handled<Reminder>, Reminder> {
        self.client_action(reminder_id, client_version, device_id, |reminder, now| {
            lifecycle::snooze(reminder, until, now)
        })
        .await
    }

    /// User dismissal, guarded by the client's `sync_version`.
    #[instrument(skip(self))]
    pub async fn dismiss_reminder(
        &self,
        reminder_id: Uuid,
        client_version: i64,
        device_id: &str,
    ) -> MutationResult<Handled<Reminder>, Reminder> {
        self.client_action(reminder_id, client_version, device_id, |reminder, now| {
            Ok(lifecycle::dismiss(reminder, now))
        })
        .await
    }

    async fn client_action<F>(
        &self,
        reminder_id: Uuid,
        client_version: i64,
        device_id: &str,
        action: F,
    ) -> MutationResult<Handled<Reminder>, Reminder>
    where
        F: FnOnce(&mut Reminder, DateTime<Utc>) -> Result<bool>,
    {
        let now = self.clock.now();
        let server = self.get_reminder(reminder_id).await?;

        if let Err(err) = SyncConflictResolver::check(&server, client_version) {
            self.resolver.record_rejection(&err, device_id, now).await;
            return Err(err);
        }

        let mut updated = server.clone();
        if !action(&mut updated, now).map_err(MutationError::from)? {
            debug!(reminder_id = %server.id, status = %server.status, "reminder already handled");
            return Ok(Handled::AlreadyHandled(server));
        }
        SyncConflictResolver::stamp(&mut updated, device_id, now);

        let saved = self
            .resolver
            .commit(self.reminders.as_ref(), updated, server.sync_version(), device_id, now)
            .await?;
        info!(reminder_id = %saved.id, status = %saved.status, device_id, "reminder updated by client");
        Ok(Handled::Applied(saved))
    }

    /// Apply a dispatcher outcome to `claimed` and write it against the
    /// claim's version.
    ///
    /// A lost compare-and-swap means someone wrote after the claim; the
    /// current row is returned untouched.
    async fn settle_claim<T, F>(&self, claimed: &Reminder, apply: F) -> Result<ClaimOutcome<T>>
    where
        F: FnOnce(&mut Reminder, DateTime<Utc>) -> Option<T>,
    {
        if claimed.lease_owner.is_none() {
            return Err(PomoSyncError::InvalidInput(format!(
                "reminder {} has no lease; claim it before recording an outcome",
                claimed.id
            )));
        }

        let now = self.clock.now();
        let mut updated = claimed.clone();
        let Some(result) = apply(&mut updated, now) else {
            return Ok(ClaimOutcome::Superseded(claimed.clone()));
        };
        SyncConflictResolver::stamp(&mut updated, DISPATCHER_DEVICE_ID, now);

        if self.reminders.compare_and_swap(&updated, claimed.sync_version()).await? {
            return Ok(ClaimOutcome::Applied(updated, result));
        }

        let current = self.reminders.get(claimed.id).await?.unwrap_or_else(|| claimed.clone());
        debug!(
            reminder_id = %claimed.id,
            claimed_version = claimed.sync_version(),
            current_version = current.sync_version(),
            status = %current.status,
            "reminder changed after claim, outcome dropped"
        );
        Ok(ClaimOutcome::Superseded(current))
    }
}

enum ClaimOutcome<T> {
    Applied(Reminder, T),
    Superseded(Reminder),
}
