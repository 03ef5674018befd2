//! Device registry and change pulls
//!
//! Writes reach the server one record at a time through the resolver. The
//! reverse direction is a pull: a device presents its cursor and receives
//! every record of its owner written after it, with soft-deleted rows
//! reduced to tombstones. The cursor the server hands back is the clock
//! reading taken before the reads.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pomosync_domain::types::device::validate_device_id;
use pomosync_domain::{
    ChangeSet, DeletedItem, Note, Reminder, Result, Session, SyncDevice, Task, Versioned,
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::ports::{ChangeFeed, DeviceRegistry};
use crate::clock::Clock;

/// One change feed per synchronized record family.
#[derive(Clone)]
pub struct ChangeFeeds {
    pub tasks: Arc<dyn ChangeFeed<Task>>,
    pub sessions: Arc<dyn ChangeFeed<Session>>,
    pub notes: Arc<dyn ChangeFeed<Note>>,
    pub reminders: Arc<dyn ChangeFeed<Reminder>>,
}

pub struct SyncService {
    feeds: ChangeFeeds,
    devices: Arc<dyn DeviceRegistry>,
    clock: Arc<dyn Clock>,
}

impl SyncService {
    pub fn new(feeds: ChangeFeeds, devices: Arc<dyn DeviceRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self { feeds, devices, clock }
    }

    /// Register a device or refresh its details and `last_seen_at`.
    #[instrument(skip(self, device_name, platform))]
    pub async fn register_device(
        &self,
        owner_id: Uuid,
        device_id: &str,
        device_name: Option<String>,
        platform: Option<String>,
    ) -> Result<SyncDevice> {
        let device = SyncDevice::register(owner_id, device_id, device_name, platform, self.clock.now());
        device.validate()?;
        let stored = self.devices.upsert_device(&device).await?;
        debug!(device_id = %stored.device_id, "device registered");
        Ok(stored)
    }

    pub async fn list_devices(&self, owner_id: Uuid) -> Result<Vec<SyncDevice>> {
        self.devices.list_devices(owner_id).await
    }

    /// Everything written for `owner_id` since `since`, or since the
    /// device's stored cursor when `since` is `None`.
    ///
    /// Unknown devices are registered on the way. A pull with no cursor at
    /// all returns every live record and no tombstones. The device's cursor
    /// advances to the returned `server_time`.
    #[instrument(skip(self))]
    pub async fn pull_changes(
        &self,
        owner_id: Uuid,
        device_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<ChangeSet> {
        validate_device_id(device_id)?;
        let server_time = self.clock.now();
        let device = self
            .devices
            .upsert_device(&SyncDevice::register(owner_id, device_id, None, None, server_time))
            .await?;
        let cursor = since.or(device.last_synced_at);

        let mut deleted = Vec::new();
        let tasks = split_live(self.feeds.tasks.changed_since(owner_id, cursor).await?, &mut deleted);
        let sessions =
            split_live(self.feeds.sessions.changed_since(owner_id, cursor).await?, &mut deleted);
        let notes = split_live(self.feeds.notes.changed_since(owner_id, cursor).await?, &mut deleted);
        let reminders =
            split_live(self.feeds.reminders.changed_since(owner_id, cursor).await?, &mut deleted);
        if cursor.is_none() {
            deleted.clear();
        }

        let changes = ChangeSet { since: cursor, server_time, tasks, sessions, notes, reminders, deleted };
        self.devices.record_sync(owner_id, &device.device_id, server_time).await?;

        info!(
            device_id = %device.device_id,
            since = ?cursor,
            tasks = changes.tasks.len(),
            sessions = changes.sessions.len(),
            notes = changes.notes.len(),
            reminders = changes.reminders.len(),
            deleted = changes.deleted.len(),
            "changes pulled"
        );
        Ok(changes)
    }
}

/// Keep live records, turning soft-deleted ones into tombstones.
fn split_live<R: Versioned>(records: Vec<R>, deleted: &mut Vec<DeletedItem>) -> Vec<R> {
    let (gone, live): (Vec<R>, Vec<R>) = records.into_iter().partition(|record| record.is_deleted());
    deleted.extend(gone.iter().map(DeletedItem::of));
    live
}
