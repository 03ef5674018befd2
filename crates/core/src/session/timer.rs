//! Live countdown of an open session
//!
//! `remaining_secs` on the stored session is banked at every pause, so the
//! live figure only has to subtract the time since the last activation.

use chrono::{DateTime, Duration, Utc};
use pomosync_domain::{PomoSyncError, Result, Session, SessionStatus, SessionType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTimer {
    pub session_id: Uuid,
    pub task_id: Option<Uuid>,
    pub session_type: SessionType,
    pub status: SessionStatus,
    pub planned_duration_secs: i64,
    pub elapsed_secs: i64,
    pub remaining_secs: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    /// When the countdown reaches zero if left running; `None` while paused.
    pub estimated_end_at: Option<DateTime<Utc>>,
}

impl SessionTimer {
    /// Timer for an active or paused session as of `now`.
    pub fn at(session: &Session, now: DateTime<Utc>) -> Result<Self> {
        let remaining_secs = match session.status {
            SessionStatus::Active => {
                let since = session.resumed_at.or(session.started_at).unwrap_or(now);
                let running = (now - since).num_seconds().max(0);
                (session.remaining_secs - running).max(0)
            }
            SessionStatus::Paused => session.remaining_secs,
            other => {
                return Err(PomoSyncError::InvalidInput(format!(
                    "session {} is {other}, timers exist only for active or paused sessions",
                    session.id
                )))
            }
        };

        let estimated_end_at = (session.status == SessionStatus::Active)
            .then(|| now + Duration::seconds(remaining_secs));

        Ok(Self {
            session_id: session.id,
            task_id: session.task_id,
            session_type: session.session_type,
            status: session.status,
            planned_duration_secs: session.planned_duration_secs,
            elapsed_secs: session.planned_duration_secs - remaining_secs,
            remaining_secs,
            started_at: session.started_at,
            paused_at: session.paused_at,
            estimated_end_at,
        })
    }

    pub fn is_expired(&self) -> bool {
        self.remaining_secs == 0
    }
}
