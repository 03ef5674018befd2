//! Optimistic-concurrency envelope shared by every synchronized record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::INITIAL_SYNC_VERSION;
use crate::errors::Result;
use crate::impl_domain_status_conversions;

/// Sync bookkeeping carried by sessions, tasks, notes and reminders.
///
/// A write is accepted only when the submitted `sync_version` equals the
/// stored one; acceptance increments it by exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetadata {
    pub sync_version: i64,
    /// Device that produced the last accepted write.
    pub device_id: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl SyncMetadata {
    pub fn new(device_id: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            sync_version: INITIAL_SYNC_VERSION,
            device_id,
            last_synced_at: Some(now),
            is_deleted: false,
            deleted_at: None,
        }
    }

    /// Record an accepted write from `device_id`.
    pub fn stamp(&mut self, device_id: &str, now: DateTime<Utc>) {
        self.sync_version += 1;
        self.device_id = Some(device_id.to_string());
        self.last_synced_at = Some(now);
    }

    /// Soft-delete marker. Does not touch the version; the accepting write
    /// stamps it.
    pub fn mark_deleted(&mut self, now: DateTime<Utc>) {
        if !self.is_deleted {
            self.is_deleted = true;
            self.deleted_at = Some(now);
        }
    }
}

/// Record families stored behind the versioned envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Session,
    Task,
    Note,
    Reminder,
}

impl_domain_status_conversions!(EntityKind {
    Session => "session",
    Task => "task",
    Note => "note",
    Reminder => "reminder",
});

/// Access to the sync envelope of a record.
pub trait Versioned: Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> Uuid;
    fn owner_id(&self) -> Uuid;
    fn sync(&self) -> &SyncMetadata;
    fn sync_mut(&mut self) -> &mut SyncMetadata;

    /// Field-level checks applied before any write is persisted.
    fn validate(&self) -> Result<()>;

    fn sync_version(&self) -> i64 {
        self.sync().sync_version
    }

    fn is_deleted(&self) -> bool {
        self.sync().is_deleted
    }
}

/// Implements [`Versioned`] for a struct with `id: Uuid`, `owner_id: Uuid`
/// and `sync: SyncMetadata` fields and an inherent `validate` method.
#[macro_export]
macro_rules! impl_versioned {
    ($ty:ty, $kind:expr) => {
        impl $crate::types::versioned::Versioned for $ty {
            const KIND: $crate::types::versioned::EntityKind = $kind;

            fn id(&self) -> uuid::Uuid {
                self.id
            }

            fn owner_id(&self) -> uuid::Uuid {
                self.owner_id
            }

            fn sync(&self) -> &$crate::types::versioned::SyncMetadata {
                &self.sync
            }

            fn sync_mut(&mut self) -> &mut $crate::types::versioned::SyncMetadata {
                &mut self.sync
            }

            fn validate(&self) -> $crate::errors::Result<()> {
                <$ty>::validate(self)
            }
        }
    };
}
