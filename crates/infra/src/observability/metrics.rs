//! Counters for the reminder worker
//!
//! Independent counters use `Relaxed` ordering; nothing derives a rate from
//! two of them at once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use pomosync_core::DispatchSummary;
use serde::Serialize;

#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    passes: AtomicU64,
    pass_errors: AtomicU64,
    pass_timeouts: AtomicU64,
    selected: AtomicU64,
    sent: AtomicU64,
    retrying: AtomicU64,
    exhausted: AtomicU64,
    skipped: AtomicU64,
    outcome_errors: AtomicU64,
    last_pass_ms: AtomicU64,
}

/// Point-in-time copy of [`SchedulerMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerMetricsSnapshot {
    pub passes: u64,
    pub pass_errors: u64,
    pub pass_timeouts: u64,
    pub selected: u64,
    pub sent: u64,
    pub retrying: u64,
    pub exhausted: u64,
    pub skipped: u64,
    pub outcome_errors: u64,
    pub last_pass_ms: u64,
}

impl SchedulerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pass(&self, summary: &DispatchSummary, elapsed: Duration) {
        self.passes.fetch_add(1, Ordering::Relaxed);
        self.selected.fetch_add(as_u64(summary.selected), Ordering::Relaxed);
        self.sent.fetch_add(as_u64(summary.sent), Ordering::Relaxed);
        self.retrying.fetch_add(as_u64(summary.retrying), Ordering::Relaxed);
        self.exhausted.fetch_add(as_u64(summary.exhausted), Ordering::Relaxed);
        self.skipped.fetch_add(as_u64(summary.skipped), Ordering::Relaxed);
        self.outcome_errors.fetch_add(as_u64(summary.errors), Ordering::Relaxed);
        self.record_duration(elapsed);
    }

    /// A pass whose selection query failed.
    pub fn record_pass_error(&self, elapsed: Duration) {
        self.passes.fetch_add(1, Ordering::Relaxed);
        self.pass_errors.fetch_add(1, Ordering::Relaxed);
        self.record_duration(elapsed);
    }

    pub fn record_pass_timeout(&self) {
        self.passes.fetch_add(1, Ordering::Relaxed);
        self.pass_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SchedulerMetricsSnapshot {
        SchedulerMetricsSnapshot {
            passes: self.passes.load(Ordering::Relaxed),
            pass_errors: self.pass_errors.load(Ordering::Relaxed),
            pass_timeouts: self.pass_timeouts.load(Ordering::Relaxed),
            selected: self.selected.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            retrying: self.retrying.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            outcome_errors: self.outcome_errors.load(Ordering::Relaxed),
            last_pass_ms: self.last_pass_ms.load(Ordering::Relaxed),
        }
    }

    fn record_duration(&self, elapsed: Duration) {
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.last_pass_ms.store(ms, Ordering::Relaxed);
    }
}

fn as_u64(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}
