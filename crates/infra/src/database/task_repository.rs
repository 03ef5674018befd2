//! SQLite-backed implementation of the `TaskRepository` port.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pomosync_core::{ChangeFeed, TaskRepository, VersionedRepository};
use pomosync_domain::{Result, Task};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use uuid::Uuid;

use super::columns::{
    opt_ts, opt_uuid, query_changed_since, read_opt_uuid, read_sync, read_ts, read_uuid, ts,
    with_connection,
};
use super::manager::{map_sql_error, DbManager};

pub struct SqliteTaskRepository {
    db: Arc<DbManager>,
}

impl SqliteTaskRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn write(conn: &Connection, sql: &str, task: &Task, expected_version: Option<i64>) -> Result<usize> {
        let id = task.id.to_string();
        let owner_id = task.owner_id.to_string();
        let project_id = opt_uuid(task.project_id);
        let created_at = ts(task.created_at);
        let last_synced_at = opt_ts(task.sync.last_synced_at);
        let deleted_at = opt_ts(task.sync.deleted_at);

        let params: [&dyn ToSql; 15] = [
            &id,
            &owner_id,
            &project_id,
            &task.title,
            &task.description,
            &task.estimated_pomodoros,
            &task.completed_pomodoros,
            &task.is_completed,
            &created_at,
            &task.sync.sync_version,
            &task.sync.device_id,
            &last_synced_at,
            &task.sync.is_deleted,
            &deleted_at,
            &expected_version,
        ];
        let bound = if expected_version.is_some() { &params[..] } else { &params[..14] };

        conn.execute(sql, bound).map_err(map_sql_error)
    }
}

#[async_trait]
impl VersionedRepository<Task> for SqliteTaskRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Task>> {
        with_connection(&self.db, move |conn| {
            conn.query_row(&format!("{TASK_SELECT} WHERE id = ?1"), params![id.to_string()], map_task_row)
                .optional()
                .map_err(map_sql_error)
        })
        .await
    }

    async fn insert(&self, record: &Task) -> Result<()> {
        let task = record.clone();
        with_connection(&self.db, move |conn| Self::write(conn, TASK_INSERT_SQL, &task, None).map(|_| ()))
            .await
    }

    async fn compare_and_swap(&self, record: &Task, expected_version: i64) -> Result<bool> {
        let task = record.clone();
        with_connection(&self.db, move |conn| {
            Self::write(conn, TASK_CAS_SQL, &task, Some(expected_version)).map(|changed| changed == 1)
        })
        .await
    }
}

#[async_trait]
impl ChangeFeed<Task> for SqliteTaskRepository {
    async fn changed_since(&self, owner_id: Uuid, since: Option<DateTime<Utc>>) -> Result<Vec<Task>> {
        with_connection(&self.db, move |conn| {
            query_changed_since(conn, TASK_SELECT, owner_id, since, map_task_row)
        })
        .await
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn set_completed_pomodoros(
        &self,
        task_id: Uuid,
        count: i64,
        touched_at: DateTime<Utc>,
    ) -> Result<bool> {
        with_connection(&self.db, move |conn| {
            conn.execute(
                "UPDATE tasks SET completed_pomodoros = ?2, last_synced_at = ?3 WHERE id = ?1",
                params![task_id.to_string(), count, ts(touched_at)],
            )
            .map(|changed| changed == 1)
            .map_err(map_sql_error)
        })
        .await
    }
}

fn map_task_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: read_uuid(row, 0)?,
        owner_id: read_uuid(row, 1)?,
        project_id: read_opt_uuid(row, 2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        estimated_pomodoros: row.get(5)?,
        completed_pomodoros: row.get(6)?,
        is_completed: row.get(7)?,
        created_at: read_ts(row, 8)?,
        sync: read_sync(row, 9)?,
    })
}

const TASK_SELECT: &str = "SELECT
        id, owner_id, project_id, title, description, estimated_pomodoros,
        completed_pomodoros, is_completed, created_at,
        sync_version, device_id, last_synced_at, is_deleted, deleted_at
    FROM tasks";

const TASK_INSERT_SQL: &str = "INSERT INTO tasks (
        id, owner_id, project_id, title, description, estimated_pomodoros,
        completed_pomodoros, is_completed, created_at,
        sync_version, device_id, last_synced_at, is_deleted, deleted_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)";

// ?7 (completed_pomodoros) is bound but never assigned: the counter is
// owned by the projector and client writes never overwrite it.
const TASK_CAS_SQL: &str = "UPDATE tasks SET
        owner_id = ?2, project_id = ?3, title = ?4, description = ?5,
        estimated_pomodoros = ?6, is_completed = ?8, created_at = ?9,
        sync_version = ?10, device_id = ?11, last_synced_at = ?12, is_deleted = ?13,
        deleted_at = ?14
    WHERE id = ?1 AND sync_version = ?15";
