//! Runtime counters exposed by background workers

pub mod metrics;

pub use metrics::{SchedulerMetrics, SchedulerMetricsSnapshot};
