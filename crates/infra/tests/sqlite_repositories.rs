//! Repository behaviour against a real SQLite file.

mod support;

use pomosync_core::{
    ReminderRepository, SessionRepository, SessionStateMachine, TaskRepository,
    VersionedRepository,
};
use pomosync_domain::{
    Note, NewNote, Reminder, ReminderPriority, ReminderStatus, Session, SessionStatus,
    SessionType, Task,
};
use pomosync_infra::{
    SqliteNoteRepository, SqliteReminderRepository, SqliteSessionRepository, SqliteTaskRepository,
};
use support::{base_time, minutes, new_reminder, new_task, new_work_session, TestDatabase, PHONE};
use uuid::Uuid;

fn transition(session: &Session, to: SessionStatus, at_minute: i64, note: Option<&str>) -> Session {
    SessionStateMachine::transition(session, to, base_time() + minutes(at_minute), note)
        .expect("legal transition")
        .session
}

#[tokio::test]
async fn session_round_trips_every_column() {
    let db = TestDatabase::new();
    let repo = SqliteSessionRepository::new(db.manager.clone());

    let mut session = Session::plan(new_work_session(Uuid::now_v7(), Some(Uuid::now_v7())), base_time());
    session = transition(&session, SessionStatus::Active, 0, None);
    session = transition(&session, SessionStatus::Interrupted, 4, Some("doorbell"));
    session.productivity_rating = Some(4);
    session.notes = Some("Lost focus after the call".into());
    session.sync.mark_deleted(base_time() + minutes(5));

    repo.insert(&session).await.unwrap();
    let loaded = repo.get(session.id).await.unwrap().expect("row exists");

    assert_eq!(loaded, session);
    assert_eq!(loaded.interruption_notes, vec!["doorbell".to_string()]);
    assert!(repo.get(Uuid::now_v7()).await.unwrap().is_none());
}

#[tokio::test]
async fn compare_and_swap_only_matches_the_expected_version() {
    let db = TestDatabase::new();
    let repo = SqliteSessionRepository::new(db.manager.clone());
    let session = Session::plan(new_work_session(Uuid::now_v7(), None), base_time());
    repo.insert(&session).await.unwrap();

    let mut started = transition(&session, SessionStatus::Active, 1, None);
    started.sync.stamp(PHONE, base_time() + minutes(1));

    assert!(!repo.compare_and_swap(&started, 7).await.unwrap());
    assert_eq!(repo.get(session.id).await.unwrap().unwrap(), session);

    assert!(repo.compare_and_swap(&started, 1).await.unwrap());
    // The same write again is now stale.
    assert!(!repo.compare_and_swap(&started, 1).await.unwrap());

    let stored = repo.get(session.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::Active);
    assert_eq!(stored.sync.sync_version, 2);
    assert_eq!(stored.sync.device_id.as_deref(), Some(PHONE));
}

#[tokio::test]
async fn duplicate_insert_is_rejected() {
    let db = TestDatabase::new();
    let repo = SqliteSessionRepository::new(db.manager.clone());
    let session = Session::plan(new_work_session(Uuid::now_v7(), None), base_time());

    repo.insert(&session).await.unwrap();
    assert!(repo.insert(&session).await.is_err());
}

#[tokio::test]
async fn open_session_lookup_skips_self_deleted_and_other_owners() {
    let db = TestDatabase::new();
    let repo = SqliteSessionRepository::new(db.manager.clone());
    let owner = Uuid::now_v7();

    let current = Session::plan(new_work_session(owner, None), base_time());
    let mut paused = Session::plan(new_work_session(owner, None), base_time());
    paused = transition(&paused, SessionStatus::Active, 0, None);
    paused = transition(&paused, SessionStatus::Paused, 3, None);
    let mut deleted_active = transition(&Session::plan(new_work_session(owner, None), base_time()), SessionStatus::Active, 0, None);
    deleted_active.sync.mark_deleted(base_time());
    let other_owner = transition(
        &Session::plan(new_work_session(Uuid::now_v7(), None), base_time()),
        SessionStatus::Active,
        0,
        None,
    );

    for session in [&current, &paused, &deleted_active, &other_owner] {
        repo.insert(session).await.unwrap();
    }

    let open = repo.find_open_session_for_owner(owner, Some(current.id)).await.unwrap();
    assert_eq!(open.map(|s| s.id), Some(paused.id));

    let open = repo.find_open_session_for_owner(owner, Some(paused.id)).await.unwrap();
    assert!(open.is_none());

    let open = repo.find_open_session_for_owner(owner, None).await.unwrap();
    assert_eq!(open.map(|s| s.id), Some(paused.id));
}

#[tokio::test]
async fn completed_work_count_ignores_breaks_deleted_and_unfinished() {
    let db = TestDatabase::new();
    let sessions = SqliteSessionRepository::new(db.manager.clone());
    let owner = Uuid::now_v7();
    let task_id = Uuid::now_v7();

    let finish = |mut session: Session| {
        session = transition(&session, SessionStatus::Active, 0, None);
        transition(&session, SessionStatus::Completed, 25, None)
    };

    let done = finish(Session::plan(new_work_session(owner, Some(task_id)), base_time()));
    let also_done = finish(Session::plan(new_work_session(owner, Some(task_id)), base_time()));
    let mut deleted = finish(Session::plan(new_work_session(owner, Some(task_id)), base_time()));
    deleted.sync.mark_deleted(base_time());
    let mut short_break = Session::plan(new_work_session(owner, Some(task_id)), base_time());
    short_break.session_type = SessionType::ShortBreak;
    short_break.planned_duration_secs = 300;
    short_break.remaining_secs = 300;
    let short_break = finish(short_break);
    let cancelled = transition(
        &Session::plan(new_work_session(owner, Some(task_id)), base_time()),
        SessionStatus::Cancelled,
        1,
        None,
    );
    let other_task = finish(Session::plan(new_work_session(owner, Some(Uuid::now_v7())), base_time()));

    for session in [&done, &also_done, &deleted, &short_break, &cancelled, &other_task] {
        sessions.insert(session).await.unwrap();
    }

    assert_eq!(sessions.count_completed_work_sessions(task_id).await.unwrap(), 2);
}

#[tokio::test]
async fn derived_pomodoro_counter_is_independent_of_client_writes() {
    let db = TestDatabase::new();
    let tasks = SqliteTaskRepository::new(db.manager.clone());
    let task = Task::create(new_task(Uuid::now_v7()), base_time());
    tasks.insert(&task).await.unwrap();

    let counted_at = base_time() + minutes(5);
    assert!(tasks.set_completed_pomodoros(task.id, 3, counted_at).await.unwrap());
    let counted = tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(counted.completed_pomodoros, 3);
    assert_eq!(counted.sync.sync_version, task.sync.sync_version);
    assert_eq!(counted.sync.last_synced_at, Some(counted_at));

    // A client edit built from the pre-count read must not reset the counter.
    let mut renamed = task.clone();
    renamed.title = "Write chapter three".into();
    renamed.sync.stamp(PHONE, base_time() + minutes(1));
    assert!(tasks.compare_and_swap(&renamed, 1).await.unwrap());

    let stored = tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Write chapter three");
    assert_eq!(stored.completed_pomodoros, 3);

    assert!(!tasks.set_completed_pomodoros(Uuid::now_v7(), 1, counted_at).await.unwrap());
}

#[tokio::test]
async fn notes_round_trip_and_swap() {
    let db = TestDatabase::new();
    let notes = SqliteNoteRepository::new(db.manager.clone());
    let note = Note::create(
        NewNote {
            owner_id: Uuid::now_v7(),
            task_id: Some(Uuid::now_v7()),
            title: "Outline".into(),
            content: "1. Intro\n2. Method".into(),
            device_id: None,
        },
        base_time(),
    );
    notes.insert(&note).await.unwrap();
    assert_eq!(notes.get(note.id).await.unwrap().unwrap(), note);

    let mut pinned = note.clone();
    pinned.is_pinned = true;
    pinned.sync.stamp(PHONE, base_time());
    assert!(notes.compare_and_swap(&pinned, 1).await.unwrap());
    assert_eq!(notes.get(note.id).await.unwrap().unwrap(), pinned);
}

async fn insert_reminder(repo: &SqliteReminderRepository, reminder: Reminder) -> Reminder {
    repo.insert(&reminder).await.unwrap();
    reminder
}

#[tokio::test]
async fn due_selection_orders_by_priority_then_schedule() {
    let db = TestDatabase::new();
    let repo = SqliteReminderRepository::new(db.manager.clone());
    let now = base_time();
    let schedule = |at, priority| Reminder::schedule(new_reminder(at, priority), now - minutes(60));

    let low_old = insert_reminder(&repo, schedule(now - minutes(50), ReminderPriority::Low)).await;
    let high_new = insert_reminder(&repo, schedule(now - minutes(1), ReminderPriority::High)).await;
    let high_old = insert_reminder(&repo, schedule(now - minutes(10), ReminderPriority::High)).await;
    let _future = insert_reminder(&repo, schedule(now + minutes(1), ReminderPriority::Urgent)).await;

    let mut exhausted = schedule(now - minutes(5), ReminderPriority::Urgent);
    exhausted.retry_count = exhausted.max_retries;
    insert_reminder(&repo, exhausted).await;

    let mut deleted = schedule(now - minutes(5), ReminderPriority::Urgent);
    deleted.sync.mark_deleted(now);
    insert_reminder(&repo, deleted).await;

    let mut leased = schedule(now - minutes(5), ReminderPriority::Urgent);
    leased.lease_owner = Some("worker-a".into());
    leased.lease_expires_at = Some(now + minutes(2));
    let leased = insert_reminder(&repo, leased).await;

    let due = repo.find_due(now, 10).await.unwrap();
    let ids: Vec<_> = due.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![high_old.id, high_new.id, low_old.id]);

    assert_eq!(repo.find_due(now, 2).await.unwrap().len(), 2);
    assert!(repo.find_due(now, 0).await.unwrap().is_empty());

    // Once the lease lapses the reminder is visible again, and first.
    let later = now + minutes(3);
    assert_eq!(repo.find_due(later, 1).await.unwrap()[0].id, leased.id);
}

#[tokio::test]
async fn snooze_ready_selection_uses_wake_up_time() {
    let db = TestDatabase::new();
    let repo = SqliteReminderRepository::new(db.manager.clone());
    let now = base_time();

    let mut early = Reminder::schedule(new_reminder(now - minutes(30), ReminderPriority::Normal), now - minutes(60));
    early.status = ReminderStatus::Snoozed;
    early.snoozed_until = Some(now - minutes(2));
    early.snooze_count = 1;
    let early = insert_reminder(&repo, early).await;

    let mut late = early.clone();
    late.id = Uuid::now_v7();
    late.snoozed_until = Some(now - minutes(1));
    let late = insert_reminder(&repo, late).await;

    let mut sleeping = early.clone();
    sleeping.id = Uuid::now_v7();
    sleeping.snoozed_until = Some(now + minutes(10));
    insert_reminder(&repo, sleeping).await;

    let ready = repo.find_snooze_ready(now, 10).await.unwrap();
    assert_eq!(ready.iter().map(|r| r.id).collect::<Vec<_>>(), vec![early.id, late.id]);

    // Snoozed reminders are never reported as due.
    assert!(repo.find_due(now, 10).await.unwrap().is_empty());
}
