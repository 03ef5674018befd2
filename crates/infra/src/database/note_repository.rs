//! SQLite-backed note storage.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pomosync_core::{ChangeFeed, NoteRepository, VersionedRepository};
use pomosync_domain::{Note, Result};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use uuid::Uuid;

use super::columns::{
    opt_ts, opt_uuid, query_changed_since, read_opt_uuid, read_sync, read_ts, read_uuid, ts,
    with_connection,
};
use super::manager::{map_sql_error, DbManager};

pub struct SqliteNoteRepository {
    db: Arc<DbManager>,
}

impl SqliteNoteRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn write(conn: &Connection, sql: &str, note: &Note, expected_version: Option<i64>) -> Result<usize> {
        let id = note.id.to_string();
        let owner_id = note.owner_id.to_string();
        let task_id = opt_uuid(note.task_id);
        let created_at = ts(note.created_at);
        let last_synced_at = opt_ts(note.sync.last_synced_at);
        let deleted_at = opt_ts(note.sync.deleted_at);

        let params: [&dyn ToSql; 13] = [
            &id,
            &owner_id,
            &task_id,
            &note.title,
            &note.content,
            &note.is_pinned,
            &created_at,
            &note.sync.sync_version,
            &note.sync.device_id,
            &last_synced_at,
            &note.sync.is_deleted,
            &deleted_at,
            &expected_version,
        ];
        let bound = if expected_version.is_some() { &params[..] } else { &params[..12] };

        conn.execute(sql, bound).map_err(map_sql_error)
    }
}

#[async_trait]
impl VersionedRepository<Note> for SqliteNoteRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Note>> {
        with_connection(&self.db, move |conn| {
            conn.query_row(&format!("{NOTE_SELECT} WHERE id = ?1"), params![id.to_string()], map_note_row)
                .optional()
                .map_err(map_sql_error)
        })
        .await
    }

    async fn insert(&self, record: &Note) -> Result<()> {
        let note = record.clone();
        with_connection(&self.db, move |conn| Self::write(conn, NOTE_INSERT_SQL, &note, None).map(|_| ()))
            .await
    }

    async fn compare_and_swap(&self, record: &Note, expected_version: i64) -> Result<bool> {
        let note = record.clone();
        with_connection(&self.db, move |conn| {
            Self::write(conn, NOTE_CAS_SQL, &note, Some(expected_version)).map(|changed| changed == 1)
        })
        .await
    }
}

#[async_trait]
impl ChangeFeed<Note> for SqliteNoteRepository {
    async fn changed_since(&self, owner_id: Uuid, since: Option<DateTime<Utc>>) -> Result<Vec<Note>> {
        with_connection(&self.db, move |conn| {
            query_changed_since(conn, NOTE_SELECT, owner_id, since, map_note_row)
        })
        .await
    }
}

impl NoteRepository for SqliteNoteRepository {}

fn map_note_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: read_uuid(row, 0)?,
        owner_id: read_uuid(row, 1)?,
        task_id: read_opt_uuid(row, 2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        is_pinned: row.get(5)?,
        created_at: read_ts(row, 6)?,
        sync: read_sync(row, 7)?,
    })
}

const NOTE_SELECT: &str = "SELECT
        id, owner_id, task_id, title, content, is_pinned, created_at,
        sync_version, device_id, last_synced_at, is_deleted, deleted_at
    FROM notes";

const NOTE_INSERT_SQL: &str = "INSERT INTO notes (
        id, owner_id, task_id, title, content, is_pinned, created_at,
        sync_version, device_id, last_synced_at, is_deleted, deleted_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)";

const NOTE_CAS_SQL: &str = "UPDATE notes SET
        owner_id = ?2, task_id = ?3, title = ?4, content = ?5, is_pinned = ?6,
        created_at = ?7, sync_version = ?8, device_id = ?9, last_synced_at = ?10,
        is_deleted = ?11, deleted_at = ?12
    WHERE id = ?1 AND sync_version = ?13";
