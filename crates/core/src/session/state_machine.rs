//! Session lifecycle state machine
//!
//! ```text
//! planned ──► active ◄──► paused
//!               │  ▲         │
//!               │  └─ interrupted
//!               ▼            ▼
//!      completed / cancelled (terminal)
//! ```
//!
//! Every lifecycle timestamp is written here and nowhere else.

use chrono::{DateTime, Utc};
use pomosync_domain::constants::MAX_INTERRUPTIONS;
use pomosync_domain::types::session::validate_notes;
use pomosync_domain::{PomoSyncError, Session, SessionStatus, SessionType};
use uuid::Uuid;

use crate::errors::{MutationError, MutationResult};

/// Side effect emitted alongside a successful transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A `work` session linked to a task reached `completed`.
    WorkSessionCompleted { session_id: Uuid, task_id: Uuid },
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub session: Session,
    pub event: Option<SessionEvent>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionStateMachine;

impl SessionStateMachine {
    /// Legal targets from `from`.
    pub fn allowed_targets(from: SessionStatus) -> &'static [SessionStatus] {
        use SessionStatus::{Active, Cancelled, Completed, Interrupted, Paused, Planned};
        match from {
            Planned => &[Active],
            Active => &[Paused, Completed, Cancelled, Interrupted],
            Paused => &[Active, Completed, Cancelled],
            Interrupted => &[Active, Cancelled],
            Completed | Cancelled => &[],
        }
    }

    pub fn can_transition(from: SessionStatus, to: SessionStatus) -> bool {
        Self::allowed_targets(from).contains(&to)
    }

    /// Move `session` to `to`, returning the updated copy.
    ///
    /// `note` is only meaningful for `interrupted` and is ignored otherwise.
    /// On error the input is untouched and the error carries it.
    pub fn transition(
        session: &Session,
        to: SessionStatus,
        now: DateTime<Utc>,
        note: Option<&str>,
    ) -> MutationResult<Transition, Session> {
        let from = session.status;
        if !Self::can_transition(from, to) {
            return Err(MutationError::InvalidTransition {
                from,
                to,
                current: Box::new(session.clone()),
            });
        }

        let mut next = session.clone();
        if from == SessionStatus::Active {
            bank_elapsed(&mut next, now);
        }

        match to {
            SessionStatus::Active => {
                if from == SessionStatus::Planned {
                    next.started_at = Some(now);
                }
                next.paused_at = None;
                next.interrupted_at = None;
                next.resumed_at = Some(now);
            }
            SessionStatus::Paused => {
                next.paused_at = Some(now);
            }
            SessionStatus::Interrupted => {
                if next.interruption_count >= MAX_INTERRUPTIONS {
                    return Err(PomoSyncError::InvalidInput(format!(
                        "session already has {MAX_INTERRUPTIONS} interruptions"
                    ))
                    .into());
                }
                next.interrupted_at = Some(now);
                next.interruption_count += 1;
                if let Some(text) = note.map(str::trim).filter(|t| !t.is_empty()) {
                    validate_notes(Some(text))?;
                    next.interruption_notes.push(text.to_string());
                }
            }
            SessionStatus::Completed => {
                next.completed_at = Some(now);
                next.paused_at = None;
                next.actual_duration_secs =
                    Some(next.planned_duration_secs - next.remaining_secs);
            }
            SessionStatus::Cancelled => {
                next.cancelled_at = Some(now);
                next.paused_at = None;
            }
            SessionStatus::Planned => {
                // No edge leads back to planned; can_transition rejected it.
                return Err(MutationError::InvalidTransition {
                    from,
                    to,
                    current: Box::new(session.clone()),
                });
            }
        }
        next.status = to;

        let event = match (to, next.session_type, next.task_id) {
            (SessionStatus::Completed, SessionType::Work, Some(task_id)) => {
                Some(SessionEvent::WorkSessionCompleted { session_id: next.id, task_id })
            }
            _ => None,
        };

        Ok(Transition { session: next, event })
    }
}

/// Deduct time spent active since the last activation.
fn bank_elapsed(session: &mut Session, now: DateTime<Utc>) {
    let Some(since) = session.resumed_at.or(session.started_at) else {
        return;
    };
    let elapsed = (now - since).num_seconds().max(0);
    session.remaining_secs = (session.remaining_secs - elapsed).max(0);
}
