//! In-memory implementations of every core port

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pomosync_core::reminders::lifecycle;
use pomosync_core::{
    ChangeFeed, DeliveryError, DeliveryReceipt, DeliveryTransport, DeviceRegistry, NoteRepository,
    ReminderRepository, SessionRepository, SyncConflictLog, TaskRepository, VersionedRepository,
};
use pomosync_domain::{
    Note, PomoSyncError, Reminder, Result as DomainResult, Session, SessionStatus, SessionType,
    SyncConflictRecord, SyncDevice, Task, Versioned,
};
use tokio::sync::Mutex as TokioMutex;
use uuid::Uuid;

/// Versioned map keyed by id. One instance per record family.
pub struct InMemoryStore<R> {
    records: TokioMutex<HashMap<Uuid, R>>,
    /// Number of upcoming compare-and-swap calls that should lose.
    forced_cas_losses: AtomicUsize,
}

impl<R> Default for InMemoryStore<R> {
    fn default() -> Self {
        Self { records: TokioMutex::new(HashMap::new()), forced_cas_losses: AtomicUsize::new(0) }
    }
}

impl<R: Versioned> InMemoryStore<R> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn snapshot(&self, id: Uuid) -> Option<R> {
        self.records.lock().await.get(&id).cloned()
    }

    /// Overwrite a record without any version check.
    pub async fn put(&self, record: R) {
        self.records.lock().await.insert(record.id(), record);
    }

    /// Make the next `n` compare-and-swap calls report a lost race.
    pub fn lose_next_cas(&self, n: usize) {
        self.forced_cas_losses.store(n, Ordering::SeqCst);
    }

    async fn all(&self) -> Vec<R> {
        self.records.lock().await.values().cloned().collect()
    }
}

#[async_trait]
impl<R: Versioned> VersionedRepository<R> for InMemoryStore<R> {
    async fn get(&self, id: Uuid) -> DomainResult<Option<R>> {
        Ok(self.records.lock().await.get(&id).cloned())
    }

    async fn insert(&self, record: &R) -> DomainResult<()> {
        let mut records = self.records.lock().await;
        if records.contains_key(&record.id()) {
            return Err(PomoSyncError::Database(format!("duplicate id {}", record.id())));
        }
        records.insert(record.id(), record.clone());
        Ok(())
    }

    async fn compare_and_swap(&self, record: &R, expected_version: i64) -> DomainResult<bool> {
        let forced = self
            .forced_cas_losses
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if forced {
            return Ok(false);
        }

        let mut records = self.records.lock().await;
        match records.get(&record.id()) {
            Some(stored) if stored.sync_version() == expected_version => {
                records.insert(record.id(), record.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl<R: Versioned> ChangeFeed<R> for InMemoryStore<R> {
    async fn changed_since(
        &self,
        owner_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> DomainResult<Vec<R>> {
        let mut changed: Vec<R> = self
            .all()
            .await
            .into_iter()
            .filter(|r| r.owner_id() == owner_id)
            .filter(|r| match (since, r.sync().last_synced_at) {
                (None, _) => true,
                (Some(since), Some(at)) => at > since,
                (Some(_), None) => false,
            })
            .collect();
        changed.sort_by_key(|r| (r.sync().last_synced_at, r.id()));
        Ok(changed)
    }
}

#[async_trait]
impl SessionRepository for InMemoryStore<Session> {
    async fn find_open_session_for_owner(
        &self,
        owner_id: Uuid,
        excluding: Option<Uuid>,
    ) -> DomainResult<Option<Session>> {
        Ok(self
            .all()
            .await
            .into_iter()
            .filter(|s| {
                s.owner_id == owner_id
                    && Some(s.id) != excluding
                    && !s.is_deleted()
                    && s.status.is_open()
            })
            .min_by_key(|s| s.created_at))
    }

    async fn count_completed_work_sessions(&self, task_id: Uuid) -> DomainResult<i64> {
        let count = self
            .all()
            .await
            .iter()
            .filter(|s| {
                s.task_id == Some(task_id)
                    && !s.is_deleted()
                    && s.status == SessionStatus::Completed
                    && s.session_type == SessionType::Work
            })
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }
}

#[async_trait]
impl TaskRepository for InMemoryStore<Task> {
    async fn set_completed_pomodoros(
        &self,
        task_id: Uuid,
        count: i64,
        touched_at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let mut records = self.records.lock().await;
        match records.get_mut(&task_id) {
            Some(task) => {
                task.completed_pomodoros = i32::try_from(count).unwrap_or(i32::MAX);
                task.sync.last_synced_at = Some(touched_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl NoteRepository for InMemoryStore<Note> {}

#[async_trait]
impl ReminderRepository for InMemoryStore<Reminder> {
    async fn find_due(&self, now: DateTime<Utc>, limit: usize) -> DomainResult<Vec<Reminder>> {
        let mut due: Vec<Reminder> = self
            .all()
            .await
            .into_iter()
            .filter(|r| !r.is_deleted() && !r.is_leased_at(now) && lifecycle::is_due(r, now))
            .collect();
        due.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.scheduled_for.cmp(&b.scheduled_for)));
        due.truncate(limit);
        Ok(due)
    }

    async fn find_snooze_ready(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> DomainResult<Vec<Reminder>> {
        let mut ready: Vec<Reminder> = self
            .all()
            .await
            .into_iter()
            .filter(|r| {
                !r.is_deleted() && !r.is_leased_at(now) && lifecycle::is_snooze_ready(r, now)
            })
            .collect();
        ready.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.snoozed_until.cmp(&b.snoozed_until)));
        ready.truncate(limit);
        Ok(ready)
    }
}

#[derive(Default)]
pub struct InMemoryConflictLog {
    entries: TokioMutex<Vec<SyncConflictRecord>>,
}

impl InMemoryConflictLog {
    pub async fn entries(&self) -> Vec<SyncConflictRecord> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl SyncConflictLog for InMemoryConflictLog {
    async fn record_conflict(&self, conflict: &SyncConflictRecord) -> DomainResult<()> {
        self.entries.lock().await.push(conflict.clone());
        Ok(())
    }

    async fn conflicts_for_record(&self, record_id: Uuid) -> DomainResult<Vec<SyncConflictRecord>> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .filter(|c| c.record_id == record_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryDeviceRegistry {
    devices: TokioMutex<HashMap<(Uuid, String), SyncDevice>>,
}

#[async_trait]
impl DeviceRegistry for InMemoryDeviceRegistry {
    async fn upsert_device(&self, device: &SyncDevice) -> DomainResult<SyncDevice> {
        let mut devices = self.devices.lock().await;
        let key = (device.owner_id, device.device_id.clone());
        let stored = match devices.get(&key) {
            Some(existing) => SyncDevice {
                device_name: device.device_name.clone().or_else(|| existing.device_name.clone()),
                platform: device.platform.clone().or_else(|| existing.platform.clone()),
                last_seen_at: device.last_seen_at,
                ..existing.clone()
            },
            None => device.clone(),
        };
        devices.insert(key, stored.clone());
        Ok(stored)
    }

    async fn get_device(&self, owner_id: Uuid, device_id: &str) -> DomainResult<Option<SyncDevice>> {
        Ok(self.devices.lock().await.get(&(owner_id, device_id.to_string())).cloned())
    }

    async fn list_devices(&self, owner_id: Uuid) -> DomainResult<Vec<SyncDevice>> {
        let mut devices: Vec<SyncDevice> =
            self.devices.lock().await.values().filter(|d| d.owner_id == owner_id).cloned().collect();
        devices.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        Ok(devices)
    }

    async fn record_sync(
        &self,
        owner_id: Uuid,
        device_id: &str,
        synced_at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let mut devices = self.devices.lock().await;
        match devices.get_mut(&(owner_id, device_id.to_string())) {
            Some(device) => {
                device.last_synced_at = device.last_synced_at.max(Some(synced_at));
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Scripted transport outcome.
#[derive(Debug, Clone)]
pub enum Script {
    Deliver,
    Fail(DeliveryError),
    /// Sleep past any reasonable delivery timeout.
    Hang,
}

/// Transport that replays a queue of scripted outcomes, delivering once the
/// queue is empty.
#[derive(Default)]
pub struct ScriptedTransport {
    script: TokioMutex<VecDeque<Script>>,
    calls: TokioMutex<Vec<Uuid>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Script>) -> Arc<Self> {
        Arc::new(Self { script: TokioMutex::new(script.into()), calls: TokioMutex::default() })
    }

    pub async fn calls(&self) -> Vec<Uuid> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl DeliveryTransport for ScriptedTransport {
    async fn send(&self, reminder: &Reminder) -> Result<DeliveryReceipt, DeliveryError> {
        self.calls.lock().await.push(reminder.id);
        let next = self.script.lock().await.pop_front().unwrap_or(Script::Deliver);
        match next {
            Script::Deliver => Ok(DeliveryReceipt {
                provider_id: Some(format!("msg-{}", reminder.id)),
                delivered_at: Utc::now(),
            }),
            Script::Fail(err) => Err(err),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(DeliveryReceipt { provider_id: None, delivered_at: Utc::now() })
            }
        }
    }
}
