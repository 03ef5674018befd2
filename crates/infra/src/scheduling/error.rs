//! Scheduler error types

use pomosync_domain::PomoSyncError;
use thiserror::Error;

use crate::errors::InfraError;

/// Worker lifecycle errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Scheduler already running")]
    AlreadyRunning,

    #[error("Scheduler not running")]
    NotRunning,

    /// The background task did not finish within the join timeout.
    #[error("Operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The background task panicked.
    #[error("Task join failed: {0}")]
    TaskJoinFailed(String),
}

impl From<SchedulerError> for InfraError {
    fn from(err: SchedulerError) -> Self {
        let mapped = match err {
            SchedulerError::AlreadyRunning | SchedulerError::NotRunning => {
                PomoSyncError::InvalidInput(err.to_string())
            }
            _ => PomoSyncError::Internal(err.to_string()),
        };
        InfraError(mapped)
    }
}

impl From<SchedulerError> for PomoSyncError {
    fn from(err: SchedulerError) -> Self {
        InfraError::from(err).into()
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
