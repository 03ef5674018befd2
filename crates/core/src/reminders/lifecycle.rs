//! Status-guarded reminder outcomes
//!
//! Every function here mutates a reminder in memory only if its status guard
//! holds, and reports whether it did. A failed guard is not an error: the
//! reminder was already handled by someone else and the caller should not
//! write anything.

use chrono::{DateTime, Duration, Utc};
use pomosync_domain::constants::MAX_FAILURE_REASON_LENGTH;
use pomosync_domain::{PomoSyncError, Reminder, ReminderStatus, Result};

/// Result of a status-guarded operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled<T> {
    Applied(T),
    /// The guard failed; carries the record as currently stored.
    AlreadyHandled(T),
}

impl<T> Handled<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Self::Applied(value) | Self::AlreadyHandled(value) => value,
        }
    }
}

/// What `mark_failed` did to the reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Back to `pending`; the next poll picks it up again.
    Retrying { retry_count: i32 },
    /// Retries used up; the reminder is now `failed`.
    Exhausted { retry_count: i32 },
    AlreadyHandled,
}

/// `pending` whose time has come and that still has retries left.
pub fn is_due(reminder: &Reminder, now: DateTime<Utc>) -> bool {
    reminder.status == ReminderStatus::Pending
        && reminder.scheduled_for <= now
        && reminder.retry_count < reminder.max_retries
}

pub fn is_snooze_ready(reminder: &Reminder, now: DateTime<Utc>) -> bool {
    reminder.status == ReminderStatus::Snoozed
        && matches!(reminder.snoozed_until, Some(until) if until <= now)
}

/// Eligible for a dispatcher to pick up right now.
pub fn is_dispatchable(reminder: &Reminder, now: DateTime<Utc>) -> bool {
    !reminder.sync.is_deleted
        && !reminder.is_leased_at(now)
        && (is_due(reminder, now) || is_snooze_ready(reminder, now))
}

/// Take a lease on a dispatchable reminder.
pub fn claim(reminder: &mut Reminder, worker_id: &str, now: DateTime<Utc>, lease: Duration) -> bool {
    if !is_dispatchable(reminder, now) {
        return false;
    }
    reminder.lease_owner = Some(worker_id.to_string());
    reminder.lease_expires_at = Some(now + lease);
    true
}

/// pending/snoozed → sent.
pub fn mark_sent(reminder: &mut Reminder, now: DateTime<Utc>) -> bool {
    if !reminder.status.is_deliverable() {
        return false;
    }
    reminder.status = ReminderStatus::Sent;
    reminder.sent_at = Some(now);
    reminder.snoozed_until = None;
    reminder.failure_reason = None;
    reminder.clear_lease();
    true
}

/// Record one failed delivery attempt from pending/snoozed.
pub fn mark_failed(reminder: &mut Reminder, reason: &str, now: DateTime<Utc>) -> FailureOutcome {
    if !reminder.status.is_deliverable() {
        return FailureOutcome::AlreadyHandled;
    }

    reminder.retry_count = (reminder.retry_count + 1).min(reminder.max_retries);
    reminder.last_retry_at = Some(now);
    reminder.failure_reason = Some(truncate_reason(reason));
    reminder.snoozed_until = None;
    reminder.clear_lease();

    if reminder.retry_count >= reminder.max_retries {
        reminder.status = ReminderStatus::Failed;
        FailureOutcome::Exhausted { retry_count: reminder.retry_count }
    } else {
        reminder.status = ReminderStatus::Pending;
        FailureOutcome::Retrying { retry_count: reminder.retry_count }
    }
}

/// pending/sent → snoozed until `until`.
///
/// Returns `Ok(false)` when the status guard fails. A past `until` or an
/// exhausted snooze allowance is invalid input.
pub fn snooze(reminder: &mut Reminder, until: DateTime<Utc>, now: DateTime<Utc>) -> Result<bool> {
    if !matches!(reminder.status, ReminderStatus::Pending | ReminderStatus::Sent) {
        return Ok(false);
    }
    if until <= now {
        return Err(PomoSyncError::InvalidInput("snooze time must be in the future".into()));
    }
    if !reminder.can_snooze() {
        return Err(PomoSyncError::InvalidInput(format!(
            "reminder has reached its snooze limit of {}",
            reminder.max_snoozes
        )));
    }

    reminder.status = ReminderStatus::Snoozed;
    reminder.snoozed_until = Some(until);
    reminder.snooze_count += 1;
    reminder.clear_lease();
    Ok(true)
}

/// pending/sent/snoozed → dismissed.
pub fn dismiss(reminder: &mut Reminder, now: DateTime<Utc>) -> bool {
    if !matches!(
        reminder.status,
        ReminderStatus::Pending | ReminderStatus::Sent | ReminderStatus::Snoozed
    ) {
        return false;
    }
    reminder.status = ReminderStatus::Dismissed;
    reminder.dismissed_at = Some(now);
    reminder.snoozed_until = None;
    reminder.clear_lease();
    true
}

/// Clamp a failure reason to the stored column width.
pub fn truncate_reason(reason: &str) -> String {
    if reason.chars().count() <= MAX_FAILURE_REASON_LENGTH {
        return reason.to_string();
    }
    let mut truncated: String = reason.chars().take(MAX_FAILURE_REASON_LENGTH - 3).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use pomosync_domain::{DeliveryMethod, NewReminder, ReminderPriority};
    use uuid::Uuid;

    use super::*;

    fn pending(now: DateTime<Utc>, max_retries: i32) -> Reminder {
        Reminder::schedule(
            NewReminder {
                owner_id: Uuid::now_v7(),
                task_id: None,
                title: "Drink water".into(),
                message: None,
                scheduled_for: now - Duration::minutes(1),
                delivery_method: DeliveryMethod::Push,
                priority: ReminderPriority::Normal,
                max_retries: Some(max_retries),
                max_snoozes: Some(2),
                recurrence_rule_id: None,
                device_id: None,
            },
            now,
        )
    }

    #[test]
    fn max_retries_failures_exhaust_the_reminder() {
        let now = Utc::now();
        let mut reminder = pending(now, 3);

        assert_eq!(mark_failed(&mut reminder, "timeout", now), FailureOutcome::Retrying { retry_count: 1 });
        assert_eq!(mark_failed(&mut reminder, "timeout", now), FailureOutcome::Retrying { retry_count: 2 });
        assert_eq!(reminder.status, ReminderStatus::Pending);

        assert_eq!(mark_failed(&mut reminder, "timeout", now), FailureOutcome::Exhausted { retry_count: 3 });
        assert_eq!(reminder.status, ReminderStatus::Failed);
        assert_eq!(reminder.retry_count, reminder.max_retries);
        assert_eq!(reminder.failure_reason.as_deref(), Some("timeout"));

        assert_eq!(mark_failed(&mut reminder, "again", now), FailureOutcome::AlreadyHandled);
        assert_eq!(reminder.retry_count, 3);
    }

    #[test]
    fn one_short_of_max_leaves_reminder_pending() {
        for max in 1..=5 {
            let now = Utc::now();
            let mut reminder = pending(now, max);
            for _ in 0..max - 1 {
                mark_failed(&mut reminder, "boom", now);
            }
            assert_eq!(reminder.status, ReminderStatus::Pending, "max_retries = {max}");
            assert_eq!(reminder.retry_count, max - 1);
        }
    }

    #[test]
    fn exhausted_reminder_is_no_longer_due() {
        let now = Utc::now();
        let mut reminder = pending(now, 1);
        assert!(is_due(&reminder, now));
        mark_failed(&mut reminder, "boom", now);
        assert!(!is_due(&reminder, now));
        assert!(!is_dispatchable(&reminder, now));
    }

    #[test]
    fn mark_sent_is_idempotent() {
        let now = Utc::now();
        let mut reminder = pending(now, 3);
        assert!(mark_sent(&mut reminder, now));
        let after_first = reminder.clone();
        assert!(!mark_sent(&mut reminder, now + Duration::seconds(5)));
        assert_eq!(reminder, after_first);
        assert_eq!(reminder.sent_at, Some(now));
    }

    #[test]
    fn snooze_rules() {
        let now = Utc::now();
        let mut reminder = pending(now, 3);

        assert!(snooze(&mut reminder, now - Duration::seconds(1), now).is_err());
        assert_eq!(reminder.status, ReminderStatus::Pending);

        assert!(snooze(&mut reminder, now + Duration::minutes(5), now).unwrap());
        assert_eq!(reminder.status, ReminderStatus::Snoozed);
        assert_eq!(reminder.snooze_count, 1);

        // Already snoozed: guard fails without touching anything.
        assert!(!snooze(&mut reminder, now + Duration::minutes(10), now).unwrap());
        assert_eq!(reminder.snoozed_until, Some(now + Duration::minutes(5)));

        let later = now + Duration::minutes(6);
        assert!(is_snooze_ready(&reminder, later));
        assert!(mark_sent(&mut reminder, later));
        assert_eq!(reminder.snoozed_until, None);

        assert!(snooze(&mut reminder, later + Duration::minutes(5), later).unwrap());
        assert!(mark_sent(&mut reminder, later + Duration::minutes(5)));

        // max_snoozes = 2
        let err = snooze(&mut reminder, later + Duration::hours(1), later).unwrap_err();
        assert!(matches!(err, PomoSyncError::InvalidInput(_)));
    }

    #[test]
    fn failure_from_snoozed_returns_to_pending() {
        let now = Utc::now();
        let mut reminder = pending(now, 3);
        snooze(&mut reminder, now + Duration::minutes(1), now).unwrap();

        let outcome = mark_failed(&mut reminder, "gateway down", now + Duration::minutes(2));
        assert_eq!(outcome, FailureOutcome::Retrying { retry_count: 1 });
        assert_eq!(reminder.status, ReminderStatus::Pending);
        assert!(reminder.snoozed_until.is_none());
    }

    #[test]
    fn dismissed_and_failed_are_terminal() {
        let now = Utc::now();
        let mut reminder = pending(now, 3);
        assert!(dismiss(&mut reminder, now));
        assert!(!dismiss(&mut reminder, now));
        assert!(!mark_sent(&mut reminder, now));
        assert_eq!(mark_failed(&mut reminder, "x", now), FailureOutcome::AlreadyHandled);
        assert!(!snooze(&mut reminder, now + Duration::minutes(1), now).unwrap());
        assert_eq!(reminder.status, ReminderStatus::Dismissed);
    }

    #[test]
    fn claim_hides_reminder_until_lease_expires() {
        let now = Utc::now();
        let mut reminder = pending(now, 3);
        assert!(claim(&mut reminder, "worker-a", now, Duration::seconds(30)));
        assert!(!claim(&mut reminder, "worker-b", now + Duration::seconds(10), Duration::seconds(30)));
        assert!(claim(&mut reminder, "worker-b", now + Duration::seconds(30), Duration::seconds(30)));
        assert_eq!(reminder.lease_owner.as_deref(), Some("worker-b"));

        assert!(mark_sent(&mut reminder, now + Duration::seconds(31)));
        assert!(reminder.lease_owner.is_none());
        assert!(reminder.lease_expires_at.is_none());
    }

    #[test]
    fn long_reasons_are_truncated() {
        let reason = "x".repeat(MAX_FAILURE_REASON_LENGTH + 50);
        let truncated = truncate_reason(&reason);
        assert_eq!(truncated.chars().count(), MAX_FAILURE_REASON_LENGTH);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncate_reason("short"), "short");
    }
}
