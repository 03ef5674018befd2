//! One polling pass of the reminder scheduler
//!
//! A pass selects due and snooze-ready reminders, claims each one with a
//! lease, hands it to the transport under a timeout, and records the
//! outcome. Failures on one reminder never abort the rest of the batch.

use std::sync::Arc;
use std::time::Duration;

use pomosync_domain::constants::{DEFAULT_BATCH_SIZE, DEFAULT_DELIVERY_TIMEOUT_SECS, DEFAULT_LEASE_SECS};
use pomosync_domain::{Reminder, Result};
use tracing::{debug, info, instrument, warn};

use super::lifecycle::{FailureOutcome, Handled};
use super::ports::{DeliveryError, DeliveryTransport};
use super::service::ReminderService;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Upper bound on reminders handled per pass, due and snoozed combined.
    pub batch_size: usize,
    pub delivery_timeout: Duration,
    pub lease: chrono::Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            delivery_timeout: Duration::from_secs(DEFAULT_DELIVERY_TIMEOUT_SECS),
            lease: chrono::Duration::seconds(DEFAULT_LEASE_SECS),
        }
    }
}

/// Counters for a single pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub selected: usize,
    /// Lost to another dispatcher or changed before the claim.
    pub skipped: usize,
    pub sent: usize,
    pub retrying: usize,
    pub exhausted: usize,
    /// Outcome writes that themselves failed.
    pub errors: usize,
}

impl DispatchSummary {
    pub fn is_idle(&self) -> bool {
        self.selected == 0
    }
}

pub struct ReminderDispatcher {
    service: Arc<ReminderService>,
    transport: Arc<dyn DeliveryTransport>,
    worker_id: String,
    config: DispatcherConfig,
}

impl ReminderDispatcher {
    pub fn new(
        service: Arc<ReminderService>,
        transport: Arc<dyn DeliveryTransport>,
        worker_id: impl Into<String>,
        config: DispatcherConfig,
    ) -> Self {
        Self { service, transport, worker_id: worker_id.into(), config }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Run one selection-and-delivery pass.
    ///
    /// Returns `Err` only when selection itself fails; nothing is mutated in
    /// that case and the next pass simply tries again.
    #[instrument(skip(self), fields(worker_id = %self.worker_id))]
    pub async fn run_pass(&self) -> Result<DispatchSummary> {
        let now = self.service.clock().now();
        let mut batch = self.service.due_reminders(now, self.config.batch_size).await?;
        let room = self.config.batch_size.saturating_sub(batch.len());
        if room > 0 {
            batch.extend(self.service.snooze_ready_reminders(now, room).await?);
        }

        let mut summary = DispatchSummary { selected: batch.len(), ..DispatchSummary::default() };
        if batch.is_empty() {
            debug!("No reminders ready for delivery");
            return Ok(summary);
        }

        info!(count = batch.len(), "Dispatching reminder batch");
        for reminder in batch {
            self.dispatch_one(&reminder, &mut summary).await;
        }

        info!(
            sent = summary.sent,
            retrying = summary.retrying,
            exhausted = summary.exhausted,
            skipped = summary.skipped,
            errors = summary.errors,
            "Reminder batch completed"
        );
        Ok(summary)
    }

    async fn dispatch_one(&self, reminder: &Reminder, summary: &mut DispatchSummary) {
        let claimed = match self.service.claim(reminder, &self.worker_id, self.config.lease).await {
            Ok(Some(claimed)) => claimed,
            Ok(None) => {
                summary.skipped += 1;
                return;
            }
            Err(err) => {
                warn!(reminder_id = %reminder.id, error = %err, "claim failed");
                summary.errors += 1;
                return;
            }
        };

        let delivery = match tokio::time::timeout(
            self.config.delivery_timeout,
            self.transport.send(&claimed),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(self.config.delivery_timeout)),
        };

        match delivery {
            Ok(receipt) => {
                debug!(
                    reminder_id = %claimed.id,
                    provider_id = receipt.provider_id.as_deref().unwrap_or("-"),
                    "Reminder delivered"
                );
                match self.service.mark_sent(&claimed).await {
                    Ok(Handled::Applied(_)) => summary.sent += 1,
                    Ok(Handled::AlreadyHandled(current)) => {
                        debug!(reminder_id = %current.id, status = %current.status, "delivered reminder was already handled");
                        summary.skipped += 1;
                    }
                    Err(err) => {
                        warn!(reminder_id = %claimed.id, error = %err, "mark_sent failed");
                        summary.errors += 1;
                    }
                }
            }
            Err(err) => {
                warn!(reminder_id = %claimed.id, error = %err, "Reminder delivery failed");
                match self.service.mark_failed(&claimed, &err.to_string()).await {
                    Ok(FailureOutcome::Retrying { .. }) => summary.retrying += 1,
                    Ok(FailureOutcome::Exhausted { .. }) => summary.exhausted += 1,
                    Ok(FailureOutcome::AlreadyHandled) => summary.skipped += 1,
                    Err(mark_err) => {
                        warn!(reminder_id = %claimed.id, error = %mark_err, "mark_failed failed");
                        summary.errors += 1;
                    }
                }
            }
        }
    }
}
