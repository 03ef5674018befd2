//! Outbound reminder delivery channels

pub mod log;
pub mod webhook;

pub use log::LogTransport;
pub use webhook::{idempotency_key, ReminderPayload, WebhookTransport};
