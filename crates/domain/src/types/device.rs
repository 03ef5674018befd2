//! Devices that pull changes for an owner

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::MAX_DEVICE_ID_LENGTH;
use crate::errors::{PomoSyncError, Result};

/// A client device known to the sync registry.
///
/// Keyed by `(owner_id, device_id)`; the device id is chosen by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncDevice {
    pub owner_id: Uuid,
    pub device_id: String,
    pub device_name: Option<String>,
    pub platform: Option<String>,
    pub registered_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    /// Cursor of the last completed pull; `None` until the first one.
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl SyncDevice {
    pub fn register(
        owner_id: Uuid,
        device_id: &str,
        device_name: Option<String>,
        platform: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            owner_id,
            device_id: device_id.trim().to_string(),
            device_name,
            platform,
            registered_at: now,
            last_seen_at: now,
            last_synced_at: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_device_id(&self.device_id)
    }
}

pub fn validate_device_id(device_id: &str) -> Result<()> {
    let trimmed = device_id.trim();
    if trimmed.is_empty() {
        return Err(PomoSyncError::InvalidInput("device id must not be empty".into()));
    }
    if trimmed.chars().count() > MAX_DEVICE_ID_LENGTH {
        return Err(PomoSyncError::InvalidInput(format!(
            "device id must be at most {MAX_DEVICE_ID_LENGTH} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_trims_the_device_id() {
        let device = SyncDevice::register(Uuid::now_v7(), "  phone ", None, None, Utc::now());
        assert_eq!(device.device_id, "phone");
        assert!(device.last_synced_at.is_none());
        assert!(device.validate().is_ok());
    }

    #[test]
    fn blank_or_oversized_ids_are_rejected() {
        assert!(validate_device_id("   ").is_err());
        assert!(validate_device_id(&"d".repeat(MAX_DEVICE_ID_LENGTH + 1)).is_err());
        assert!(validate_device_id(&"d".repeat(MAX_DEVICE_ID_LENGTH)).is_ok());
    }
}
