//! Port interfaces for versioned persistence

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pomosync_domain::{Result, SyncConflictRecord, SyncDevice, Versioned};
use uuid::Uuid;

/// Storage for a record family guarded by `sync_version`.
#[async_trait]
pub trait VersionedRepository<R: Versioned>: Send + Sync {
    /// Fetch a record by id, including soft-deleted rows.
    async fn get(&self, id: Uuid) -> Result<Option<R>>;

    /// Insert a brand-new record.
    async fn insert(&self, record: &R) -> Result<()>;

    /// Overwrite the stored record only if its version still equals
    /// `expected_version`.
    ///
    /// Returns `false` when another writer got there first; nothing is
    /// written in that case.
    async fn compare_and_swap(&self, record: &R, expected_version: i64) -> Result<bool>;
}

/// Append-only audit trail of rejected writes.
#[async_trait]
pub trait SyncConflictLog: Send + Sync {
    async fn record_conflict(&self, conflict: &SyncConflictRecord) -> Result<()>;

    async fn conflicts_for_record(&self, record_id: Uuid) -> Result<Vec<SyncConflictRecord>>;
}

/// Pull side of sync: what changed for an owner since a cursor.
#[async_trait]
pub trait ChangeFeed<R: Versioned>: Send + Sync {
    /// Records of `owner_id` whose last accepted write is strictly after
    /// `since`, soft-deleted rows included, oldest write first. `None`
    /// returns every record of the owner.
    async fn changed_since(&self, owner_id: Uuid, since: Option<DateTime<Utc>>) -> Result<Vec<R>>;
}

/// Devices known per owner and their pull cursors.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Insert `device`, or refresh an existing one: `last_seen_at` is
    /// overwritten, name and platform only when given, `registered_at` and
    /// `last_synced_at` are kept. Returns the stored row.
    async fn upsert_device(&self, device: &SyncDevice) -> Result<SyncDevice>;

    async fn get_device(&self, owner_id: Uuid, device_id: &str) -> Result<Option<SyncDevice>>;

    async fn list_devices(&self, owner_id: Uuid) -> Result<Vec<SyncDevice>>;

    /// Advance the device's pull cursor. The cursor never moves backwards.
    /// Returns `false` if the device is unknown.
    async fn record_sync(&self, owner_id: Uuid, device_id: &str, synced_at: DateTime<Utc>) -> Result<bool>;
}
