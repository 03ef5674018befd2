//! Background loop driving the reminder dispatcher.
//!
//! Join handles are tracked, cancellation is explicit, and every pass runs
//! under a timeout so a wedged transport cannot stall the loop forever.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use pomosync_core::ReminderDispatcher;
//! use pomosync_infra::observability::SchedulerMetrics;
//! use pomosync_infra::scheduling::{ReminderWorker, ReminderWorkerConfig};
//!
//! # async fn example(dispatcher: Arc<ReminderDispatcher>) -> pomosync_infra::scheduling::SchedulerResult<()> {
//! let mut worker = ReminderWorker::new(
//!     dispatcher,
//!     ReminderWorkerConfig::default(),
//!     Arc::new(SchedulerMetrics::new()),
//! );
//!
//! worker.start()?;
//! // ... application runs ...
//! worker.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use pomosync_core::{DispatchSummary, DispatcherConfig, ReminderDispatcher};
use pomosync_domain::{Result, SchedulerConfig};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::error::{SchedulerError, SchedulerResult};
use crate::observability::SchedulerMetrics;

#[derive(Debug, Clone)]
pub struct ReminderWorkerConfig {
    /// Delay between passes; also the effective retry spacing.
    pub poll_interval: Duration,
    /// Upper bound on a whole pass.
    pub pass_timeout: Duration,
    pub join_timeout: Duration,
}

impl Default for ReminderWorkerConfig {
    fn default() -> Self {
        Self::from(&SchedulerConfig::default())
    }
}

impl From<&SchedulerConfig> for ReminderWorkerConfig {
    fn from(config: &SchedulerConfig) -> Self {
        let poll_interval = Duration::from_secs(config.poll_interval_secs.max(1));
        // Worst case every reminder in the batch hits the delivery timeout.
        let batch = u32::try_from(config.batch_size.max(1)).unwrap_or(u32::MAX);
        let pass_timeout = Duration::from_secs(config.delivery_timeout_secs.max(1))
            .saturating_mul(batch)
            .saturating_add(Duration::from_secs(30));

        Self { poll_interval, pass_timeout, join_timeout: Duration::from_secs(5) }
    }
}

/// Dispatcher settings derived from the `scheduler` configuration section.
pub fn dispatcher_config(config: &SchedulerConfig) -> DispatcherConfig {
    DispatcherConfig {
        batch_size: config.batch_size.max(1),
        delivery_timeout: Duration::from_secs(config.delivery_timeout_secs.max(1)),
        lease: chrono::Duration::seconds(config.lease_secs.max(1)),
    }
}

pub struct ReminderWorker {
    dispatcher: Arc<ReminderDispatcher>,
    config: ReminderWorkerConfig,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
    metrics: Arc<SchedulerMetrics>,
}

impl ReminderWorker {
    pub fn new(
        dispatcher: Arc<ReminderDispatcher>,
        config: ReminderWorkerConfig,
        metrics: Arc<SchedulerMetrics>,
    ) -> Self {
        Self {
            dispatcher,
            config,
            cancellation: CancellationToken::new(),
            task_handle: None,
            metrics,
        }
    }

    /// Spawn the polling loop.
    #[instrument(skip(self), fields(worker_id = %self.dispatcher.worker_id()))]
    pub fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        info!(poll_interval_ms = self.config.poll_interval.as_millis() as u64, "Starting reminder worker");

        self.cancellation = CancellationToken::new();

        let dispatcher = Arc::clone(&self.dispatcher);
        let config = self.config.clone();
        let cancel = self.cancellation.clone();
        let metrics = Arc::clone(&self.metrics);

        self.task_handle = Some(tokio::spawn(async move {
            Self::process_loop(dispatcher, config, cancel, metrics).await;
        }));

        Ok(())
    }

    /// Cancel the loop and wait for the in-flight pass to finish.
    #[instrument(skip(self), fields(worker_id = %self.dispatcher.worker_id()))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        info!("Stopping reminder worker");
        self.cancellation.cancel();

        if let Some(handle) = self.task_handle.take() {
            let join_timeout = self.config.join_timeout;
            match tokio::time::timeout(join_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("Reminder worker task panicked: {}", e);
                    return Err(SchedulerError::TaskJoinFailed(e.to_string()));
                }
                Err(_) => {
                    warn!("Reminder worker did not stop within timeout");
                    return Err(SchedulerError::Timeout { seconds: join_timeout.as_secs() });
                }
            }
        }

        self.cancellation = CancellationToken::new();
        info!("Reminder worker stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    pub fn metrics(&self) -> &Arc<SchedulerMetrics> {
        &self.metrics
    }

    /// Run a single pass in the caller's task, recording metrics.
    pub async fn run_once(&self) -> Result<DispatchSummary> {
        let started = Instant::now();
        match self.dispatcher.run_pass().await {
            Ok(summary) => {
                self.metrics.record_pass(&summary, started.elapsed());
                Ok(summary)
            }
            Err(err) => {
                self.metrics.record_pass_error(started.elapsed());
                Err(err)
            }
        }
    }

    async fn process_loop(
        dispatcher: Arc<ReminderDispatcher>,
        config: ReminderWorkerConfig,
        cancel: CancellationToken,
        metrics: Arc<SchedulerMetrics>,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Reminder worker loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(config.poll_interval) => {
                    let started = Instant::now();

                    match tokio::time::timeout(config.pass_timeout, dispatcher.run_pass()).await {
                        Ok(Ok(summary)) => metrics.record_pass(&summary, started.elapsed()),
                        Ok(Err(e)) => {
                            error!(error = %e, "Reminder pass failed");
                            metrics.record_pass_error(started.elapsed());
                        }
                        Err(_) => {
                            warn!(timeout_secs = config.pass_timeout.as_secs(), "Reminder pass timed out");
                            metrics.record_pass_timeout();
                        }
                    }
                }
            }
        }
    }
}

impl Drop for ReminderWorker {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("ReminderWorker dropped while running; cancelling task");
            self.cancellation.cancel();
        }
    }
}
