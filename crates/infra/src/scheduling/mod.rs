//! Background scheduling for reminder delivery
//!
//! The worker follows the usual runtime rules: explicit start/stop, a
//! tracked join handle, a cancellation token and a timeout around every
//! pass.

pub mod error;
pub mod reminder_worker;

pub use error::{SchedulerError, SchedulerResult};
pub use reminder_worker::{dispatcher_config, ReminderWorker, ReminderWorkerConfig};
