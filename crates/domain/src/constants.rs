//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Session validation bounds
pub const MIN_PLANNED_DURATION_SECS: i64 = 60;
pub const MAX_PLANNED_DURATION_SECS: i64 = 3600;
pub const MAX_INTERRUPTIONS: i32 = 100;
pub const MAX_NOTES_LENGTH: usize = 1000;
pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

// Reminder delivery
pub const DEFAULT_MAX_RETRIES: i32 = 3;
pub const DEFAULT_MAX_SNOOZES: i32 = 3;
pub const MAX_FAILURE_REASON_LENGTH: usize = 256;

// Device registry
pub const MAX_DEVICE_ID_LENGTH: usize = 128;

// Scheduler defaults
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_DELIVERY_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LEASE_SECS: i64 = 120;

// Every versioned record starts here; the first accepted write moves it to 2.
pub const INITIAL_SYNC_VERSION: i64 = 1;
