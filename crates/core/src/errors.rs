//! Errors returned by the mutation path

use pomosync_domain::{PomoSyncError, SessionStatus};
use thiserror::Error;
use uuid::Uuid;

/// Outcome of a rejected client mutation.
///
/// Conflict-class variants carry the current server record so the client can
/// rebase without a second round trip.
#[derive(Debug, Error)]
pub enum MutationError<R> {
    /// The submitted `sync_version` no longer matches the stored one.
    #[error(
        "sync conflict on {record_id}: submitted version {submitted_version}, current version \
         {current_version}"
    )]
    SyncConflict {
        record_id: Uuid,
        submitted_version: i64,
        current_version: i64,
        current: Box<R>,
    },

    #[error("invalid session transition from {from} to {to}")]
    InvalidTransition { from: SessionStatus, to: SessionStatus, current: Box<R> },

    /// The owner already has another active or paused session.
    #[error("owner {owner_id} already has open session {open_session_id}")]
    ActiveSessionExists { owner_id: Uuid, open_session_id: Uuid },

    #[error(transparent)]
    Domain(#[from] PomoSyncError),
}

impl<R> MutationError<R> {
    /// Conflict-class errors are resolved by re-reading, not by fixing input.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::SyncConflict { .. } | Self::InvalidTransition { .. } | Self::ActiveSessionExists { .. }
        )
    }

    /// Current server record, when the error carries one.
    pub fn current(&self) -> Option<&R> {
        match self {
            Self::SyncConflict { current, .. } | Self::InvalidTransition { current, .. } => {
                Some(current.as_ref())
            }
            _ => None,
        }
    }

    /// Stable label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SyncConflict { .. } => "sync_conflict",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::ActiveSessionExists { .. } => "active_session_exists",
            Self::Domain(err) => err.label(),
        }
    }
}

pub type MutationResult<T, R = T> = std::result::Result<T, MutationError<R>>;
