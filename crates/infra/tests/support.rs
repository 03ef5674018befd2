#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use pomosync_domain::{
    DeliveryMethod, NewReminder, NewSession, NewTask, ReminderPriority, SessionType,
};
use pomosync_infra::database::DbManager;
use tempfile::TempDir;
use uuid::Uuid;

pub const LAPTOP: &str = "laptop";
pub const PHONE: &str = "phone";

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a migrated database in a fresh temp directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("pomosync-test.db");

        let manager = DbManager::new(&db_path, 4, 2_000).expect("db manager should be created");
        manager.run_migrations().expect("migrations should run");

        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }

    /// Run a scalar query, for asserting on raw table state.
    pub fn query_i64(&self, sql: &str) -> i64 {
        let conn = self.manager.get_connection().expect("connection should be available");
        conn.query_row(sql, [], |row| row.get(0)).expect("scalar query should succeed")
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

pub fn base_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-02T09:00:00Z")
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

pub fn minutes(n: i64) -> Duration {
    Duration::minutes(n)
}

pub fn new_work_session(owner_id: Uuid, task_id: Option<Uuid>) -> NewSession {
    NewSession {
        owner_id,
        task_id,
        session_type: SessionType::Work,
        planned_duration_secs: 1500,
        notes: None,
        device_id: Some(LAPTOP.to_string()),
    }
}

pub fn new_task(owner_id: Uuid) -> NewTask {
    NewTask {
        owner_id,
        project_id: None,
        title: "Write chapter two".to_string(),
        description: Some("First draft".to_string()),
        estimated_pomodoros: Some(6),
        device_id: Some(LAPTOP.to_string()),
    }
}

pub fn new_reminder(scheduled_for: DateTime<Utc>, priority: ReminderPriority) -> NewReminder {
    NewReminder {
        owner_id: Uuid::now_v7(),
        task_id: None,
        title: "Drink water".to_string(),
        message: Some("Refill the bottle".to_string()),
        scheduled_for,
        delivery_method: DeliveryMethod::Push,
        priority,
        max_retries: Some(3),
        max_snoozes: Some(2),
        recurrence_rule_id: None,
        device_id: Some(PHONE.to_string()),
    }
}
