//! Column encoding shared by the SQLite repositories
//!
//! UUIDs are stored as hyphenated text. Timestamps are RFC 3339 UTC text
//! with a fixed nanosecond fraction, which keeps them lossless and lets
//! `<=` comparisons in SQL follow chronological order.

use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use pomosync_domain::{PomoSyncError, Result, SyncMetadata};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use tokio::task;
use uuid::Uuid;

use super::manager::{map_sql_error, DbConnection, DbManager};

pub(crate) fn ts(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn opt_ts(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(ts)
}

pub(crate) fn opt_uuid(value: Option<Uuid>) -> Option<String> {
    value.map(|id| id.to_string())
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| conversion_error(idx, err))
}

pub(crate) fn read_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|err| conversion_error(idx, err))
}

pub(crate) fn read_opt_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|value| Uuid::parse_str(&value).map_err(|err| conversion_error(idx, err))).transpose()
}

pub(crate) fn read_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

pub(crate) fn read_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|value| parse_ts(idx, &value)).transpose()
}

/// Parse a text column through the type's `FromStr`.
pub(crate) fn read_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.to_string().into())
    })
}

/// Read the sync envelope starting at column `start`.
///
/// Every table selects `sync_version, device_id, last_synced_at, is_deleted,
/// deleted_at` last and in that order.
pub(crate) fn read_sync(row: &Row<'_>, start: usize) -> rusqlite::Result<SyncMetadata> {
    Ok(SyncMetadata {
        sync_version: row.get(start)?,
        device_id: row.get(start + 1)?,
        last_synced_at: read_opt_ts(row, start + 2)?,
        is_deleted: row.get(start + 3)?,
        deleted_at: read_opt_ts(row, start + 4)?,
    })
}

/// Run `op` on a pooled connection inside `spawn_blocking`.
pub(crate) async fn with_connection<T, F>(db: &Arc<DbManager>, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&DbConnection) -> Result<T> + Send + 'static,
{
    let db = Arc::clone(db);
    task::spawn_blocking(move || -> Result<T> {
        let conn = db.get_connection()?;
        op(&conn)
    })
    .await
    .map_err(map_join_error)?
}

/// Rows of `owner_id` written after `since`, oldest write first.
///
/// `select` is a table's full `SELECT ... FROM table` prefix; every
/// versioned table carries `owner_id` and `last_synced_at`.
pub(crate) fn query_changed_since<R>(
    conn: &Connection,
    select: &str,
    owner_id: Uuid,
    since: Option<DateTime<Utc>>,
    map_row: fn(&Row<'_>) -> rusqlite::Result<R>,
) -> Result<Vec<R>> {
    let mut stmt = conn
        .prepare(&format!(
            "{select}
             WHERE owner_id = ?1 AND (?2 IS NULL OR last_synced_at > ?2)
             ORDER BY last_synced_at, id"
        ))
        .map_err(map_sql_error)?;
    let rows = stmt.query_map(params![owner_id.to_string(), opt_ts(since)], map_row).map_err(map_sql_error)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
}

pub(crate) fn usize_to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn map_join_error(err: task::JoinError) -> PomoSyncError {
    if err.is_cancelled() {
        PomoSyncError::Internal("blocking database task cancelled".into())
    } else {
        PomoSyncError::Internal(format!("blocking database task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn timestamps_sort_lexicographically() {
        let earlier = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let later = earlier + chrono::Duration::nanoseconds(1_500);

        assert!(ts(earlier) < ts(later));
        assert_eq!(ts(earlier), "2026-03-02T09:00:00.000000000Z");
    }

    #[test]
    fn timestamps_round_trip_without_loss() {
        let now = Utc::now();
        assert_eq!(parse_ts(0, &ts(now)).unwrap(), now);
    }

    #[test]
    fn usize_conversion_saturates() {
        assert_eq!(usize_to_i64(50), 50);
        assert_eq!(usize_to_i64(usize::MAX), i64::MAX);
    }
}
