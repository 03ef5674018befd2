//! Delivery through the webhook channel and the background worker.

mod support;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pomosync_core::{
    DeliveryError, DeliveryTransport, DispatcherConfig, ReminderDispatcher, ReminderService,
    SystemClock,
};
use pomosync_domain::{PomoSyncError, Reminder, ReminderPriority, ReminderStatus};
use pomosync_infra::delivery::{idempotency_key, ReminderPayload};
use pomosync_infra::{
    LogTransport, ReminderWorker, ReminderWorkerConfig, SchedulerError, SchedulerMetrics,
    SqliteReminderRepository, WebhookTransport,
};
use serde_json::json;
use support::{minutes, new_reminder, TestDatabase};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOOK_PATH: &str = "/hooks/reminders";

fn reminder_service(db: &TestDatabase) -> Arc<ReminderService> {
    Arc::new(ReminderService::new(
        Arc::new(SqliteReminderRepository::new(db.manager.clone())),
        Arc::new(SystemClock),
    ))
}

fn webhook(server: &MockServer) -> Arc<WebhookTransport> {
    let url = format!("{}{HOOK_PATH}", server.uri());
    Arc::new(WebhookTransport::new(&url, Duration::from_secs(2)).unwrap())
}

fn dispatcher(
    service: Arc<ReminderService>,
    transport: Arc<dyn DeliveryTransport>,
) -> Arc<ReminderDispatcher> {
    Arc::new(ReminderDispatcher::new(
        service,
        transport,
        "test-worker",
        DispatcherConfig {
            batch_size: 10,
            delivery_timeout: Duration::from_secs(2),
            lease: chrono::Duration::seconds(30),
        },
    ))
}

fn due_now() -> Reminder {
    Reminder::schedule(new_reminder(Utc::now() - minutes(1), ReminderPriority::High), Utc::now())
}

#[tokio::test]
async fn webhook_posts_payload_with_idempotency_key() {
    let server = MockServer::start().await;
    let reminder = due_now();

    Mock::given(method("POST"))
        .and(path(HOOK_PATH))
        .and(header("Idempotency-Key", idempotency_key(&reminder).as_str()))
        .and(body_partial_json(json!({ "title": "Drink water", "priority": "high", "attempt": 1 })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({ "id": "msg-42" })))
        .expect(1)
        .mount(&server)
        .await;

    let receipt = webhook(&server).send(&reminder).await.unwrap();
    assert_eq!(receipt.provider_id.as_deref(), Some("msg-42"));

    let requests = server.received_requests().await.unwrap();
    let payload: ReminderPayload = requests[0].body_json().unwrap();
    assert_eq!(payload, ReminderPayload::from(&reminder));
}

#[test]
fn snoozed_redelivery_uses_a_fresh_key() {
    let mut reminder = due_now();
    let first = idempotency_key(&reminder);
    reminder.retry_count += 1;
    assert_eq!(idempotency_key(&reminder), first);

    reminder.snooze_count += 1;
    assert_ne!(idempotency_key(&reminder), first);
}

#[tokio::test]
async fn webhook_error_status_is_a_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = webhook(&server).send(&due_now()).await.unwrap_err();
    match err {
        DeliveryError::Rejected { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "Internal Server Error");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_webhook_is_unavailable() {
    // Bind then drop a plain listener so nothing accepts on the port.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let url = format!("http://{addr}{HOOK_PATH}");
    let transport = WebhookTransport::new(&url, Duration::from_secs(2)).unwrap();

    let err = transport.send(&due_now()).await.unwrap_err();
    assert!(matches!(err, DeliveryError::Unavailable(_)));
}

#[test]
fn webhook_rejects_non_http_endpoints() {
    for bad in ["ftp://example.com/hook", "not a url"] {
        let err = WebhookTransport::new(bad, Duration::from_secs(1)).err().unwrap();
        assert!(matches!(err, PomoSyncError::Config(_)), "{bad}");
    }
}

#[tokio::test]
async fn dispatch_pass_over_sqlite_records_each_outcome() {
    let db = TestDatabase::new();
    let service = reminder_service(&db);
    let server = MockServer::start().await;

    let delivered = service
        .create_reminder(new_reminder(Utc::now() - minutes(2), ReminderPriority::Urgent))
        .await
        .unwrap();
    let mut refused_input = new_reminder(Utc::now() - minutes(1), ReminderPriority::Low);
    refused_input.title = "Stand up".into();
    let refused = service.create_reminder(refused_input).await.unwrap();

    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "title": "Stand up" })))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let summary = dispatcher(service.clone(), webhook(&server)).run_pass().await.unwrap();
    assert_eq!(summary.selected, 2);
    assert_eq!(summary.sent, 1);
    assert_eq!(summary.retrying, 1);

    let sent = service.get_reminder(delivered.id).await.unwrap();
    assert_eq!(sent.status, ReminderStatus::Sent);
    assert!(sent.sent_at.is_some());
    assert!(sent.lease_owner.is_none());

    let retry = service.get_reminder(refused.id).await.unwrap();
    assert_eq!(retry.status, ReminderStatus::Pending);
    assert_eq!(retry.retry_count, 1);
    assert!(retry.failure_reason.unwrap().contains("maintenance"));
    assert!(retry.lease_owner.is_none());
}

#[tokio::test]
async fn worker_delivers_in_background_and_stops_cleanly() {
    let db = TestDatabase::new();
    let service = reminder_service(&db);
    let reminder = service
        .create_reminder(new_reminder(Utc::now() - minutes(1), ReminderPriority::Normal))
        .await
        .unwrap();

    let metrics = Arc::new(SchedulerMetrics::new());
    let mut worker = ReminderWorker::new(
        dispatcher(service.clone(), Arc::new(LogTransport)),
        ReminderWorkerConfig {
            poll_interval: Duration::from_millis(20),
            pass_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(2),
        },
        metrics.clone(),
    );

    worker.start().unwrap();
    assert!(matches!(worker.start(), Err(SchedulerError::AlreadyRunning)));

    let mut status = ReminderStatus::Pending;
    for _ in 0..100 {
        status = service.get_reminder(reminder.id).await.unwrap().status;
        if status == ReminderStatus::Sent {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(status, ReminderStatus::Sent);

    worker.stop().await.unwrap();
    assert!(!worker.is_running());
    assert!(matches!(worker.stop().await, Err(SchedulerError::NotRunning)));

    let snapshot = metrics.snapshot();
    assert!(snapshot.passes >= 1);
    assert_eq!(snapshot.sent, 1);
}
