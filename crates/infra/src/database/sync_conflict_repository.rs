//! Persistent audit trail of rejected writes.

use std::sync::Arc;

use async_trait::async_trait;
use pomosync_core::SyncConflictLog;
use pomosync_domain::{EntityKind, Result, SyncConflictRecord};
use rusqlite::{params, Row};
use uuid::Uuid;

use super::columns::{read_enum, read_ts, read_uuid, ts, with_connection};
use super::manager::{map_sql_error, DbManager};

pub struct SqliteSyncConflictLog {
    db: Arc<DbManager>,
}

impl SqliteSyncConflictLog {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SyncConflictLog for SqliteSyncConflictLog {
    async fn record_conflict(&self, conflict: &SyncConflictRecord) -> Result<()> {
        let conflict = conflict.clone();
        with_connection(&self.db, move |conn| {
            conn.execute(
                "INSERT INTO sync_conflicts (
                    id, entity_kind, record_id, device_id, submitted_version, current_version,
                    detected_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    conflict.id.to_string(),
                    conflict.entity_kind.as_str(),
                    conflict.record_id.to_string(),
                    conflict.device_id,
                    conflict.submitted_version,
                    conflict.current_version,
                    ts(conflict.detected_at),
                ],
            )
            .map(|_| ())
            .map_err(map_sql_error)
        })
        .await
    }

    async fn conflicts_for_record(&self, record_id: Uuid) -> Result<Vec<SyncConflictRecord>> {
        with_connection(&self.db, move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, entity_kind, record_id, device_id, submitted_version,
                            current_version, detected_at
                     FROM sync_conflicts
                     WHERE record_id = ?1
                     ORDER BY detected_at, rowid",
                )
                .map_err(map_sql_error)?;
            let rows = stmt
                .query_map(params![record_id.to_string()], map_conflict_row)
                .map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
    }
}

fn map_conflict_row(row: &Row<'_>) -> rusqlite::Result<SyncConflictRecord> {
    Ok(SyncConflictRecord {
        id: read_uuid(row, 0)?,
        entity_kind: read_enum::<EntityKind>(row, 1)?,
        record_id: read_uuid(row, 2)?,
        device_id: row.get(3)?,
        submitted_version: row.get(4)?,
        current_version: row.get(5)?,
        detected_at: read_ts(row, 6)?,
    })
}
