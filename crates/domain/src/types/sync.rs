use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::note::Note;
use super::reminder::Reminder;
use super::session::Session;
use super::task::Task;
use super::versioned::{EntityKind, Versioned};

/// Audit entry for a write rejected because its version was stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflictRecord {
    pub id: Uuid,
    pub entity_kind: EntityKind,
    pub record_id: Uuid,
    pub device_id: String,
    pub submitted_version: i64,
    pub current_version: i64,
    pub detected_at: DateTime<Utc>,
}

impl SyncConflictRecord {
    pub fn new(
        entity_kind: EntityKind,
        record_id: Uuid,
        device_id: &str,
        submitted_version: i64,
        current_version: i64,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            entity_kind,
            record_id,
            device_id: device_id.to_string(),
            submitted_version,
            current_version,
            detected_at,
        }
    }
}

/// Tombstone for a soft-deleted record, sent to devices instead of the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedItem {
    pub entity_kind: EntityKind,
    pub record_id: Uuid,
    pub sync_version: i64,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl DeletedItem {
    pub fn of<R: Versioned>(record: &R) -> Self {
        Self {
            entity_kind: R::KIND,
            record_id: record.id(),
            sync_version: record.sync_version(),
            deleted_at: record.sync().deleted_at,
        }
    }
}

/// Everything an owner's records gained since a device's last pull.
///
/// `server_time` is the cursor the device should present on its next pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub since: Option<DateTime<Utc>>,
    pub server_time: DateTime<Utc>,
    pub tasks: Vec<Task>,
    pub sessions: Vec<Session>,
    pub notes: Vec<Note>,
    pub reminders: Vec<Reminder>,
    pub deleted: Vec<DeletedItem>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
            && self.sessions.is_empty()
            && self.notes.is_empty()
            && self.reminders.is_empty()
            && self.deleted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
            + self.sessions.len()
            + self.notes.len()
            + self.reminders.len()
            + self.deleted.len()
    }
}
