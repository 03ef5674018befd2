//! Reminder scheduling, delivery outcomes and user actions

pub mod dispatcher;
pub mod lifecycle;
pub mod ports;
pub mod service;

pub use dispatcher::{DispatchSummary, DispatcherConfig, ReminderDispatcher};
pub use lifecycle::{FailureOutcome, Handled};
pub use ports::{DeliveryError, DeliveryReceipt, DeliveryTransport, ReminderRepository};
pub use service::{ReminderService, DISPATCHER_DEVICE_ID};
