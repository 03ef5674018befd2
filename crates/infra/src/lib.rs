//! # PomoSync Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - SQLite repositories for sessions, tasks, notes, reminders, the
//!   sync-conflict audit log and the device registry
//! - Reminder delivery channels (webhook, log)
//! - The background reminder worker and its counters
//! - Configuration loading
//!
//! ## Architecture
//! - Implements traits defined in `pomosync-core`
//! - Contains all "impure" code (I/O, HTTP, background tasks)

pub mod config;
pub mod database;
pub mod delivery;
pub mod errors;
pub mod observability;
pub mod scheduling;

pub use database::{
    DbManager, SqliteDeviceRegistry, SqliteNoteRepository, SqliteReminderRepository,
    SqliteSessionRepository, SqliteSyncConflictLog, SqliteTaskRepository,
};
pub use delivery::{LogTransport, WebhookTransport};
pub use errors::InfraError;
pub use observability::SchedulerMetrics;
pub use scheduling::{ReminderWorker, ReminderWorkerConfig, SchedulerError};
