//! SQLite-backed implementation of the `SessionRepository` port.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pomosync_core::{ChangeFeed, SessionRepository, VersionedRepository};
use pomosync_domain::{Result, Session, SessionStatus, SessionType};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use uuid::Uuid;

use super::columns::{
    opt_ts, opt_uuid, query_changed_since, read_enum, read_opt_ts, read_opt_uuid, read_sync,
    read_ts, read_uuid, ts, with_connection,
};
use super::manager::{map_sql_error, DbManager};

/// SQLite-backed session store.
pub struct SqliteSessionRepository {
    db: Arc<DbManager>,
}

impl SqliteSessionRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Bind every column; `expected_version` is only consumed by the
    /// compare-and-swap statement.
    fn write(
        conn: &Connection,
        sql: &str,
        session: &Session,
        expected_version: Option<i64>,
    ) -> Result<usize> {
        let id = session.id.to_string();
        let owner_id = session.owner_id.to_string();
        let task_id = opt_uuid(session.task_id);
        let session_type = session.session_type.as_str();
        let status = session.status.as_str();
        let started_at = opt_ts(session.started_at);
        let paused_at = opt_ts(session.paused_at);
        let resumed_at = opt_ts(session.resumed_at);
        let interrupted_at = opt_ts(session.interrupted_at);
        let completed_at = opt_ts(session.completed_at);
        let cancelled_at = opt_ts(session.cancelled_at);
        let interruption_notes = serde_json::to_string(&session.interruption_notes)
            .map_err(|err| rusqlite::Error::ToSqlConversionFailure(Box::new(err)))
            .map_err(map_sql_error)?;
        let created_at = ts(session.created_at);
        let last_synced_at = opt_ts(session.sync.last_synced_at);
        let deleted_at = opt_ts(session.sync.deleted_at);

        let params: [&dyn ToSql; 26] = [
            &id,
            &owner_id,
            &task_id,
            &session_type,
            &status,
            &session.planned_duration_secs,
            &session.remaining_secs,
            &started_at,
            &paused_at,
            &resumed_at,
            &interrupted_at,
            &completed_at,
            &cancelled_at,
            &session.actual_duration_secs,
            &session.interruption_count,
            &interruption_notes,
            &session.productivity_rating,
            &session.focus_rating,
            &session.notes,
            &created_at,
            &session.sync.sync_version,
            &session.sync.device_id,
            &last_synced_at,
            &session.sync.is_deleted,
            &deleted_at,
            &expected_version,
        ];
        let bound = if expected_version.is_some() { &params[..] } else { &params[..25] };

        conn.execute(sql, bound).map_err(map_sql_error)
    }
}

#[async_trait]
impl VersionedRepository<Session> for SqliteSessionRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Session>> {
        with_connection(&self.db, move |conn| {
            conn.query_row(&format!("{SESSION_SELECT} WHERE id = ?1"), params![id.to_string()], map_session_row)
                .optional()
                .map_err(map_sql_error)
        })
        .await
    }

    async fn insert(&self, record: &Session) -> Result<()> {
        let session = record.clone();
        with_connection(&self.db, move |conn| {
            Self::write(conn, SESSION_INSERT_SQL, &session, None).map(|_| ())
        })
        .await
    }

    async fn compare_and_swap(&self, record: &Session, expected_version: i64) -> Result<bool> {
        let session = record.clone();
        with_connection(&self.db, move |conn| {
            Self::write(conn, SESSION_CAS_SQL, &session, Some(expected_version))
                .map(|changed| changed == 1)
        })
        .await
    }
}

#[async_trait]
impl ChangeFeed<Session> for SqliteSessionRepository {
    async fn changed_since(&self, owner_id: Uuid, since: Option<DateTime<Utc>>) -> Result<Vec<Session>> {
        with_connection(&self.db, move |conn| {
            query_changed_since(conn, SESSION_SELECT, owner_id, since, map_session_row)
        })
        .await
    }
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn find_open_session_for_owner(
        &self,
        owner_id: Uuid,
        excluding: Option<Uuid>,
    ) -> Result<Option<Session>> {
        with_connection(&self.db, move |conn| {
            conn.query_row(
                &format!(
                    "{SESSION_SELECT}
                     WHERE owner_id = ?1 AND (?2 IS NULL OR id != ?2) AND is_deleted = 0
                       AND status IN ('active', 'paused')
                     ORDER BY created_at
                     LIMIT 1"
                ),
                params![owner_id.to_string(), opt_uuid(excluding)],
                map_session_row,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
    }

    async fn count_completed_work_sessions(&self, task_id: Uuid) -> Result<i64> {
        with_connection(&self.db, move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM sessions
                 WHERE task_id = ?1 AND session_type = 'work' AND status = 'completed'
                   AND is_deleted = 0",
                params![task_id.to_string()],
                |row| row.get(0),
            )
            .map_err(map_sql_error)
        })
        .await
    }
}

fn map_session_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    let notes_json: String = row.get(15)?;
    let interruption_notes: Vec<String> = serde_json::from_str(&notes_json).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(15, rusqlite::types::Type::Text, Box::new(err))
    })?;

    Ok(Session {
        id: read_uuid(row, 0)?,
        owner_id: read_uuid(row, 1)?,
        task_id: read_opt_uuid(row, 2)?,
        session_type: read_enum::<SessionType>(row, 3)?,
        status: read_enum::<SessionStatus>(row, 4)?,
        planned_duration_secs: row.get(5)?,
        remaining_secs: row.get(6)?,
        started_at: read_opt_ts(row, 7)?,
        paused_at: read_opt_ts(row, 8)?,
        resumed_at: read_opt_ts(row, 9)?,
        interrupted_at: read_opt_ts(row, 10)?,
        completed_at: read_opt_ts(row, 11)?,
        cancelled_at: read_opt_ts(row, 12)?,
        actual_duration_secs: row.get(13)?,
        interruption_count: row.get(14)?,
        interruption_notes,
        productivity_rating: row.get(16)?,
        focus_rating: row.get(17)?,
        notes: row.get(18)?,
        created_at: read_ts(row, 19)?,
        sync: read_sync(row, 20)?,
    })
}

const SESSION_SELECT: &str = "SELECT
        id, owner_id, task_id, session_type, status, planned_duration_secs, remaining_secs,
        started_at, paused_at, resumed_at, interrupted_at, completed_at, cancelled_at,
        actual_duration_secs, interruption_count, interruption_notes, productivity_rating,
        focus_rating, notes, created_at,
        sync_version, device_id, last_synced_at, is_deleted, deleted_at
    FROM sessions";

const SESSION_INSERT_SQL: &str = "INSERT INTO sessions (
        id, owner_id, task_id, session_type, status, planned_duration_secs, remaining_secs,
        started_at, paused_at, resumed_at, interrupted_at, completed_at, cancelled_at,
        actual_duration_secs, interruption_count, interruption_notes, productivity_rating,
        focus_rating, notes, created_at,
        sync_version, device_id, last_synced_at, is_deleted, deleted_at
    ) VALUES (
        ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
        ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25
    )";

const SESSION_CAS_SQL: &str = "UPDATE sessions SET
        owner_id = ?2, task_id = ?3, session_type = ?4, status = ?5,
        planned_duration_secs = ?6, remaining_secs = ?7, started_at = ?8, paused_at = ?9,
        resumed_at = ?10, interrupted_at = ?11, completed_at = ?12, cancelled_at = ?13,
        actual_duration_secs = ?14, interruption_count = ?15, interruption_notes = ?16,
        productivity_rating = ?17, focus_rating = ?18, notes = ?19, created_at = ?20,
        sync_version = ?21, device_id = ?22, last_synced_at = ?23, is_deleted = ?24,
        deleted_at = ?25
    WHERE id = ?1 AND sync_version = ?26";
