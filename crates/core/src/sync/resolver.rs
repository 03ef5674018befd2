//! Optimistic-concurrency reconciliation
//!
//! A client write carries the `sync_version` it last saw. The resolver
//! accepts it only when that version is still current, applies the mutation
//! to a copy of the server record, and stamps the copy with the next version.
//! Persisting goes through a per-record compare-and-swap so two writers that
//! both passed the in-memory check cannot both win.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pomosync_domain::{PomoSyncError, SyncConflictRecord, Versioned};
use tracing::{debug, warn};

use super::ports::{SyncConflictLog, VersionedRepository};
use crate::errors::{MutationError, MutationResult};

#[derive(Clone, Default)]
pub struct SyncConflictResolver {
    conflict_log: Option<Arc<dyn SyncConflictLog>>,
}

impl SyncConflictResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every rejected write in `log`.
    pub fn with_conflict_log(mut self, log: Arc<dyn SyncConflictLog>) -> Self {
        self.conflict_log = Some(log);
        self
    }

    /// Reject `client_version` unless it equals the server's version.
    pub fn check<R: Versioned>(server: &R, client_version: i64) -> MutationResult<(), R> {
        let current_version = server.sync_version();
        if client_version == current_version {
            return Ok(());
        }
        Err(MutationError::SyncConflict {
            record_id: server.id(),
            submitted_version: client_version,
            current_version,
            current: Box::new(server.clone()),
        })
    }

    /// Mark `record` as written by `device_id` at `now`.
    pub fn stamp<R: Versioned>(record: &mut R, device_id: &str, now: DateTime<Utc>) {
        record.sync_mut().stamp(device_id, now);
    }

    /// Version-check, then apply `mutation` to a copy of `server`.
    ///
    /// The server record is never touched. On success the returned copy
    /// carries `sync_version + 1`, the submitting device and `now`.
    pub fn reconcile<R, F>(
        server: &R,
        client_version: i64,
        device_id: &str,
        now: DateTime<Utc>,
        mutation: F,
    ) -> MutationResult<R>
    where
        R: Versioned,
        F: FnOnce(&mut R) -> MutationResult<(), R>,
    {
        Self::check(server, client_version)?;

        let mut updated = server.clone();
        mutation(&mut updated)?;
        Self::stamp(&mut updated, device_id, now);
        Ok(updated)
    }

    /// Persist a reconciled record.
    ///
    /// `expected_version` is the version the record had when it was read.
    /// A lost compare-and-swap re-reads the row and reports a conflict
    /// against what is stored now.
    pub async fn commit<R, P>(
        &self,
        repo: &P,
        updated: R,
        expected_version: i64,
        device_id: &str,
        now: DateTime<Utc>,
    ) -> MutationResult<R>
    where
        R: Versioned,
        P: VersionedRepository<R> + ?Sized,
    {
        updated.validate()?;

        if repo.compare_and_swap(&updated, expected_version).await? {
            debug!(
                kind = %R::KIND,
                record_id = %updated.id(),
                sync_version = updated.sync_version(),
                device_id,
                "write accepted"
            );
            return Ok(updated);
        }

        let current = repo
            .get(updated.id())
            .await?
            .ok_or_else(|| PomoSyncError::not_found(R::KIND, &updated.id().to_string()))?;

        let err = MutationError::SyncConflict {
            record_id: current.id(),
            submitted_version: expected_version,
            current_version: current.sync_version(),
            current: Box::new(current),
        };
        self.record_rejection(&err, device_id, now).await;
        Err(err)
    }

    /// Write a conflict to the audit log, if one is configured.
    ///
    /// Audit failures are logged and never change the caller's outcome.
    pub async fn record_rejection<R: Versioned>(
        &self,
        err: &MutationError<R>,
        device_id: &str,
        now: DateTime<Utc>,
    ) {
        let MutationError::SyncConflict { record_id, submitted_version, current_version, .. } = err
        else {
            return;
        };

        warn!(
            kind = %R::KIND,
            record_id = %record_id,
            submitted_version,
            current_version,
            device_id,
            "stale write rejected"
        );

        let Some(log) = &self.conflict_log else {
            return;
        };

        let entry = SyncConflictRecord::new(
            R::KIND,
            *record_id,
            device_id,
            *submitted_version,
            *current_version,
            now,
        );
        if let Err(log_err) = log.record_conflict(&entry).await {
            warn!(error = %log_err, record_id = %record_id, "failed to record sync conflict");
        }
    }
}
