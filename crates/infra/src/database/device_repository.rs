//! SQLite-backed registry of syncing devices and their pull cursors.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pomosync_core::DeviceRegistry;
use pomosync_domain::{PomoSyncError, Result, SyncDevice};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::columns::{opt_ts, read_opt_ts, read_ts, read_uuid, ts, with_connection};
use super::manager::{map_sql_error, DbManager};

const DEVICE_SELECT: &str = "SELECT owner_id, device_id, device_name, platform, registered_at,
        last_seen_at, last_synced_at
 FROM sync_devices";

pub struct SqliteDeviceRegistry {
    db: Arc<DbManager>,
}

impl SqliteDeviceRegistry {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DeviceRegistry for SqliteDeviceRegistry {
    async fn upsert_device(&self, device: &SyncDevice) -> Result<SyncDevice> {
        device.validate()?;
        let device = device.clone();
        with_connection(&self.db, move |conn| {
            conn.execute(
                "INSERT INTO sync_devices (
                    owner_id, device_id, device_name, platform, registered_at, last_seen_at,
                    last_synced_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(owner_id, device_id) DO UPDATE SET
                    device_name = COALESCE(excluded.device_name, sync_devices.device_name),
                    platform = COALESCE(excluded.platform, sync_devices.platform),
                    last_seen_at = excluded.last_seen_at",
                params![
                    device.owner_id.to_string(),
                    device.device_id,
                    device.device_name,
                    device.platform,
                    ts(device.registered_at),
                    ts(device.last_seen_at),
                    opt_ts(device.last_synced_at),
                ],
            )
            .map_err(map_sql_error)?;

            load_device(conn, device.owner_id, &device.device_id)?.ok_or_else(|| {
                PomoSyncError::Internal(format!("device {} vanished after upsert", device.device_id))
            })
        })
        .await
    }

    async fn get_device(&self, owner_id: Uuid, device_id: &str) -> Result<Option<SyncDevice>> {
        let device_id = device_id.trim().to_string();
        with_connection(&self.db, move |conn| load_device(conn, owner_id, &device_id)).await
    }

    async fn list_devices(&self, owner_id: Uuid) -> Result<Vec<SyncDevice>> {
        with_connection(&self.db, move |conn| {
            let mut stmt = conn
                .prepare(&format!("{DEVICE_SELECT} WHERE owner_id = ?1 ORDER BY device_id"))
                .map_err(map_sql_error)?;
            let rows = stmt
                .query_map(params![owner_id.to_string()], map_device_row)
                .map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
    }

    async fn record_sync(&self, owner_id: Uuid, device_id: &str, synced_at: DateTime<Utc>) -> Result<bool> {
        let device_id = device_id.trim().to_string();
        with_connection(&self.db, move |conn| {
            conn.execute(
                "UPDATE sync_devices SET last_synced_at = ?3
                 WHERE owner_id = ?1 AND device_id = ?2
                   AND (last_synced_at IS NULL OR last_synced_at < ?3)",
                params![owner_id.to_string(), device_id, ts(synced_at)],
            )
            .map_err(map_sql_error)?;

            // An unchanged row still counts: the cursor was already ahead.
            Ok(load_device(conn, owner_id, &device_id)?.is_some())
        })
        .await
    }
}

fn load_device(conn: &Connection, owner_id: Uuid, device_id: &str) -> Result<Option<SyncDevice>> {
    conn.query_row(
        &format!("{DEVICE_SELECT} WHERE owner_id = ?1 AND device_id = ?2"),
        params![owner_id.to_string(), device_id],
        map_device_row,
    )
    .optional()
    .map_err(map_sql_error)
}

fn map_device_row(row: &Row<'_>) -> rusqlite::Result<SyncDevice> {
    Ok(SyncDevice {
        owner_id: read_uuid(row, 0)?,
        device_id: row.get(1)?,
        device_name: row.get(2)?,
        platform: row.get(3)?,
        registered_at: read_ts(row, 4)?,
        last_seen_at: read_ts(row, 5)?,
        last_synced_at: read_opt_ts(row, 6)?,
    })
}
