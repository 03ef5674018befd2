//! Record builders

use chrono::{DateTime, Duration, Utc};
use pomosync_domain::{
    DeliveryMethod, NewReminder, NewSession, NewTask, ReminderPriority, SessionType,
};
use uuid::Uuid;

pub const LAPTOP: &str = "laptop";
pub const PHONE: &str = "phone";

pub fn base_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-02T09:00:00Z")
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
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

pub fn new_break(owner_id: Uuid, task_id: Option<Uuid>) -> NewSession {
    NewSession {
        session_type: SessionType::ShortBreak,
        planned_duration_secs: 300,
        ..new_work_session(owner_id, task_id)
    }
}

pub fn new_task(owner_id: Uuid) -> NewTask {
    NewTask {
        owner_id,
        project_id: None,
        title: "Quarterly report".to_string(),
        description: None,
        estimated_pomodoros: Some(4),
        device_id: Some(LAPTOP.to_string()),
    }
}

pub fn new_reminder(scheduled_for: DateTime<Utc>, priority: ReminderPriority) -> NewReminder {
    NewReminder {
        owner_id: Uuid::now_v7(),
        task_id: None,
        title: "Stretch".to_string(),
        message: Some("Stand up and stretch".to_string()),
        scheduled_for,
        delivery_method: DeliveryMethod::Push,
        priority,
        max_retries: Some(3),
        max_snoozes: Some(3),
        recurrence_rule_id: None,
        device_id: Some(LAPTOP.to_string()),
    }
}

pub fn minutes(n: i64) -> Duration {
    Duration::minutes(n)
}
