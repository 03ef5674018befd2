//! SQLite-backed implementation of the `ReminderRepository` port.
//!
//! Selection queries mirror the dispatcher's eligibility rules: soft-deleted
//! rows and rows under a live lease are never returned, and results are
//! ordered by priority rank, then by the relevant timestamp.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pomosync_core::{ChangeFeed, ReminderRepository, VersionedRepository};
use pomosync_domain::{DeliveryMethod, Reminder, ReminderPriority, ReminderStatus, Result};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use uuid::Uuid;

use super::columns::{
    opt_ts, opt_uuid, query_changed_since, read_enum, read_opt_ts, read_opt_uuid, read_sync,
    read_ts, read_uuid, ts, usize_to_i64, with_connection,
};
use super::manager::{map_sql_error, DbManager};

pub struct SqliteReminderRepository {
    db: Arc<DbManager>,
}

impl SqliteReminderRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn write(
        conn: &Connection,
        sql: &str,
        reminder: &Reminder,
        expected_version: Option<i64>,
    ) -> Result<usize> {
        let id = reminder.id.to_string();
        let owner_id = reminder.owner_id.to_string();
        let task_id = opt_uuid(reminder.task_id);
        let scheduled_for = ts(reminder.scheduled_for);
        let status = reminder.status.as_str();
        let delivery_method = reminder.delivery_method.as_str();
        let priority = reminder.priority.as_str();
        let priority_rank = reminder.priority.rank();
        let last_retry_at = opt_ts(reminder.last_retry_at);
        let snoozed_until = opt_ts(reminder.snoozed_until);
        let sent_at = opt_ts(reminder.sent_at);
        let dismissed_at = opt_ts(reminder.dismissed_at);
        let recurrence_rule_id = opt_uuid(reminder.recurrence_rule_id);
        let lease_expires_at = opt_ts(reminder.lease_expires_at);
        let created_at = ts(reminder.created_at);
        let last_synced_at = opt_ts(reminder.sync.last_synced_at);
        let deleted_at = opt_ts(reminder.sync.deleted_at);

        let params: [&dyn ToSql; 29] = [
            &id,
            &owner_id,
            &task_id,
            &reminder.title,
            &reminder.message,
            &scheduled_for,
            &status,
            &delivery_method,
            &priority,
            &priority_rank,
            &reminder.retry_count,
            &reminder.max_retries,
            &last_retry_at,
            &reminder.failure_reason,
            &snoozed_until,
            &reminder.snooze_count,
            &reminder.max_snoozes,
            &sent_at,
            &dismissed_at,
            &recurrence_rule_id,
            &reminder.lease_owner,
            &lease_expires_at,
            &created_at,
            &reminder.sync.sync_version,
            &reminder.sync.device_id,
            &last_synced_at,
            &reminder.sync.is_deleted,
            &deleted_at,
            &expected_version,
        ];
        let bound = if expected_version.is_some() { &params[..] } else { &params[..28] };

        conn.execute(sql, bound).map_err(map_sql_error)
    }

    async fn select(&self, filter: &'static str, now: DateTime<Utc>, limit: usize) -> Result<Vec<Reminder>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        with_connection(&self.db, move |conn| {
            let mut stmt = conn.prepare(&format!("{REMINDER_SELECT} {filter}")).map_err(map_sql_error)?;
            let rows = stmt
                .query_map(params![ts(now), usize_to_i64(limit)], map_reminder_row)
                .map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
    }
}

#[async_trait]
impl VersionedRepository<Reminder> for SqliteReminderRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Reminder>> {
        with_connection(&self.db, move |conn| {
            conn.query_row(
                &format!("{REMINDER_SELECT} WHERE id = ?1"),
                params![id.to_string()],
                map_reminder_row,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
    }

    async fn insert(&self, record: &Reminder) -> Result<()> {
        let reminder = record.clone();
        with_connection(&self.db, move |conn| {
            Self::write(conn, REMINDER_INSERT_SQL, &reminder, None).map(|_| ())
        })
        .await
    }

    async fn compare_and_swap(&self, record: &Reminder, expected_version: i64) -> Result<bool> {
        let reminder = record.clone();
        with_connection(&self.db, move |conn| {
            Self::write(conn, REMINDER_CAS_SQL, &reminder, Some(expected_version))
                .map(|changed| changed == 1)
        })
        .await
    }
}

#[async_trait]
impl ChangeFeed<Reminder> for SqliteReminderRepository {
    async fn changed_since(&self, owner_id: Uuid, since: Option<DateTime<Utc>>) -> Result<Vec<Reminder>> {
        with_connection(&self.db, move |conn| {
            query_changed_since(conn, REMINDER_SELECT, owner_id, since, map_reminder_row)
        })
        .await
    }
}

#[async_trait]
impl ReminderRepository for SqliteReminderRepository {
    async fn find_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Reminder>> {
        self.select(DUE_FILTER, now, limit).await
    }

    async fn find_snooze_ready(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Reminder>> {
        self.select(SNOOZE_READY_FILTER, now, limit).await
    }
}

fn map_reminder_row(row: &Row<'_>) -> rusqlite::Result<Reminder> {
    Ok(Reminder {
        id: read_uuid(row, 0)?,
        owner_id: read_uuid(row, 1)?,
        task_id: read_opt_uuid(row, 2)?,
        title: row.get(3)?,
        message: row.get(4)?,
        scheduled_for: read_ts(row, 5)?,
        status: read_enum::<ReminderStatus>(row, 6)?,
        delivery_method: read_enum::<DeliveryMethod>(row, 7)?,
        priority: read_enum::<ReminderPriority>(row, 8)?,
        // 9 is priority_rank, derived from priority.
        retry_count: row.get(10)?,
        max_retries: row.get(11)?,
        last_retry_at: read_opt_ts(row, 12)?,
        failure_reason: row.get(13)?,
        snoozed_until: read_opt_ts(row, 14)?,
        snooze_count: row.get(15)?,
        max_snoozes: row.get(16)?,
        sent_at: read_opt_ts(row, 17)?,
        dismissed_at: read_opt_ts(row, 18)?,
        recurrence_rule_id: read_opt_uuid(row, 19)?,
        lease_owner: row.get(20)?,
        lease_expires_at: read_opt_ts(row, 21)?,
        created_at: read_ts(row, 22)?,
        sync: read_sync(row, 23)?,
    })
}

const REMINDER_SELECT: &str = "SELECT
        id, owner_id, task_id, title, message, scheduled_for, status, delivery_method,
        priority, priority_rank, retry_count, max_retries, last_retry_at, failure_reason,
        snoozed_until, snooze_count, max_snoozes, sent_at, dismissed_at, recurrence_rule_id,
        lease_owner, lease_expires_at, created_at,
        sync_version, device_id, last_synced_at, is_deleted, deleted_at
    FROM reminders";

const DUE_FILTER: &str = "WHERE status = 'pending' AND is_deleted = 0
        AND scheduled_for <= ?1
        AND retry_count < max_retries
        AND (lease_expires_at IS NULL OR lease_expires_at <= ?1)
    ORDER BY priority_rank DESC, scheduled_for ASC
    LIMIT ?2";

const SNOOZE_READY_FILTER: &str = "WHERE status = 'snoozed' AND is_deleted = 0
        AND snoozed_until IS NOT NULL AND snoozed_until <= ?1
        AND (lease_expires_at IS NULL OR lease_expires_at <= ?1)
    ORDER BY priority_rank DESC, snoozed_until ASC
    LIMIT ?2";

const REMINDER_INSERT_SQL: &str = "INSERT INTO reminders (
        id, owner_id, task_id, title, message, scheduled_for, status, delivery_method,
        priority, priority_rank, retry_count, max_retries, last_retry_at, failure_reason,
        snoozed_until, snooze_count, max_snoozes, sent_at, dismissed_at, recurrence_rule_id,
        lease_owner, lease_expires_at, created_at,
        sync_version, device_id, last_synced_at, is_deleted, deleted_at
    ) VALUES (
        ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
        ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28
    )";

const REMINDER_CAS_SQL: &str = "UPDATE reminders SET
        owner_id = ?2, task_id = ?3, title = ?4, message = ?5, scheduled_for = ?6,
        status = ?7, delivery_method = ?8, priority = ?9, priority_rank = ?10,
        retry_count = ?11, max_retries = ?12, last_retry_at = ?13, failure_reason = ?14,
        snoozed_until = ?15, snooze_count = ?16, max_snoozes = ?17, sent_at = ?18,
        dismissed_at = ?19, recurrence_rule_id = ?20, lease_owner = ?21,
        lease_expires_at = ?22, created_at = ?23, sync_version = ?24, device_id = ?25,
        last_synced_at = ?26, is_deleted = ?27, deleted_at = ?28
    WHERE id = ?1 AND sync_version = ?29";
