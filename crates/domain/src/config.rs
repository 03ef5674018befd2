//! Runtime configuration structures
//!
//! Every section carries serde defaults so a partial file (or an empty one)
//! still yields a usable configuration.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_DELIVERY_TIMEOUT_SECS, DEFAULT_LEASE_SECS,
    DEFAULT_POLL_INTERVAL_SECS,
};
use crate::errors::{PomoSyncError, Result};

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub sync: SyncPolicyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Cross-field checks that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            pool_size: default_pool_size(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// Reminder dispatcher settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_delivery_timeout_secs")]
    pub delivery_timeout_secs: u64,
    /// How long a claimed reminder stays invisible to other dispatchers.
    #[serde(default = "default_lease_secs")]
    pub lease_secs: i64,
    /// Optional webhook endpoint; reminders are only logged when absent.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            batch_size: DEFAULT_BATCH_SIZE,
            delivery_timeout_secs: DEFAULT_DELIVERY_TIMEOUT_SECS,
            lease_secs: DEFAULT_LEASE_SECS,
            webhook_url: None,
        }
    }
}

impl SchedulerConfig {
    /// A lease must outlive the delivery it covers, otherwise a second
    /// dispatcher can claim and send a reminder that is still in flight.
    pub fn validate(&self) -> Result<()> {
        let lease = self.lease_secs.max(1);
        let timeout = i64::try_from(self.delivery_timeout_secs.max(1)).unwrap_or(i64::MAX);
        if lease <= timeout {
            return Err(PomoSyncError::Config(format!(
                "scheduler lease ({lease}s) must be longer than the delivery timeout ({timeout}s)"
            )));
        }
        Ok(())
    }
}

/// Mutation-path policy switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPolicyConfig {
    /// Reject a session activation while the owner has another open session.
    #[serde(default = "default_true")]
    pub enforce_single_active_session: bool,
    /// Persist rejected writes to the conflict audit log.
    #[serde(default = "default_true")]
    pub record_conflicts: bool,
}

impl Default for SyncPolicyConfig {
    fn default() -> Self {
        Self { enforce_single_active_session: true, record_conflicts: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), json: false }
    }
}

fn default_db_path() -> String {
    "pomosync.db".to_string()
}

fn default_pool_size() -> u32 {
    8
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_delivery_timeout_secs() -> u64 {
    DEFAULT_DELIVERY_TIMEOUT_SECS
}

fn default_lease_secs() -> i64 {
    DEFAULT_LEASE_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.sync.enforce_single_active_session);
        assert_eq!(config.scheduler.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"scheduler": {"poll_interval_secs": 5}}"#).unwrap();
        assert_eq!(config.scheduler.poll_interval_secs, 5);
        assert_eq!(config.scheduler.lease_secs, DEFAULT_LEASE_SECS);
        assert!(config.scheduler.enabled);
        assert_eq!(config.database.path, "pomosync.db");
    }

    #[test]
    fn defaults_pass_validation() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn lease_must_outlive_delivery_timeout() {
        let short = SchedulerConfig { lease_secs: 1, delivery_timeout_secs: 10, ..SchedulerConfig::default() };
        let err = short.validate().unwrap_err();
        assert!(matches!(err, PomoSyncError::Config(ref msg) if msg.contains("lease")));

        let equal = SchedulerConfig { lease_secs: 10, delivery_timeout_secs: 10, ..SchedulerConfig::default() };
        assert!(equal.validate().is_err());

        let longer = SchedulerConfig { lease_secs: 11, delivery_timeout_secs: 10, ..SchedulerConfig::default() };
        assert!(longer.validate().is_ok());
    }

    #[test]
    fn zero_values_are_compared_as_one_second() {
        let config = SchedulerConfig { lease_secs: 0, delivery_timeout_secs: 0, ..SchedulerConfig::default() };
        assert!(config.validate().is_err());
    }
}
