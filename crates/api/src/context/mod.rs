//! Application context - dependency injection container

use std::sync::Arc;
use std::time::Duration;

use pomosync_core::{
    ChangeFeeds, Clock, DeliveryTransport, FieldMutationService, ReminderDispatcher,
    ReminderService, SessionService, SyncConflictLog, SyncConflictResolver, SyncService,
    SystemClock, TaskProgressProjector,
};
use pomosync_domain::{Config, Note, PomoSyncError, Reminder, Result, SchedulerConfig, Session, Task};
use pomosync_infra::scheduling::dispatcher_config;
use pomosync_infra::{
    DbManager, LogTransport, ReminderWorker, ReminderWorkerConfig, SchedulerMetrics,
    SqliteDeviceRegistry, SqliteNoteRepository, SqliteReminderRepository, SqliteSessionRepository,
    SqliteSyncConflictLog, SqliteTaskRepository, WebhookTransport,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::utils::health::{ComponentHealth, HealthStatus};

pub type TaskMutations = FieldMutationService<Task, SqliteTaskRepository>;
pub type NoteMutations = FieldMutationService<Note, SqliteNoteRepository>;
pub type SessionFieldMutations = FieldMutationService<Session, SqliteSessionRepository>;
pub type ReminderFieldMutations = FieldMutationService<Reminder, SqliteReminderRepository>;

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,

    // Mutation path
    pub sessions: Arc<SessionService>,
    pub session_fields: Arc<SessionFieldMutations>,
    pub tasks: Arc<TaskMutations>,
    pub notes: Arc<NoteMutations>,
    pub reminders: Arc<ReminderService>,
    pub reminder_fields: Arc<ReminderFieldMutations>,
    pub projector: Arc<TaskProgressProjector>,
    pub conflict_log: Arc<dyn SyncConflictLog>,

    // Pull path
    pub sync: Arc<SyncService>,

    // Reminder delivery
    pub dispatcher: Arc<ReminderDispatcher>,
    pub scheduler_metrics: Arc<SchedulerMetrics>,
    worker: Mutex<ReminderWorker>,
}

impl AppContext {
    /// Build the context against the database named in `config`.
    ///
    /// Migrations run here. The reminder worker is constructed but not
    /// started; see [`AppContext::start_scheduler`].
    pub async fn new(config: Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock)).await
    }

    /// Same as [`AppContext::new`] with an injected clock.
    pub async fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let db = Arc::new(DbManager::from_config(&config.database)?);
        let migrations = Arc::clone(&db);
        tokio::task::spawn_blocking(move || migrations.run_migrations())
            .await
            .map_err(|err| PomoSyncError::Internal(format!("migration task failed: {err}")))??;

        let session_repo = Arc::new(SqliteSessionRepository::new(Arc::clone(&db)));
        let task_repo = Arc::new(SqliteTaskRepository::new(Arc::clone(&db)));
        let note_repo = Arc::new(SqliteNoteRepository::new(Arc::clone(&db)));
        let reminder_repo = Arc::new(SqliteReminderRepository::new(Arc::clone(&db)));
        let conflict_log: Arc<dyn SyncConflictLog> =
            Arc::new(SqliteSyncConflictLog::new(Arc::clone(&db)));

        let resolver = if config.sync.record_conflicts {
            SyncConflictResolver::new().with_conflict_log(Arc::clone(&conflict_log))
        } else {
            SyncConflictResolver::new()
        };

        let feeds = ChangeFeeds {
            tasks: task_repo.clone(),
            sessions: session_repo.clone(),
            notes: note_repo.clone(),
            reminders: reminder_repo.clone(),
        };
        let sync = Arc::new(SyncService::new(
            feeds,
            Arc::new(SqliteDeviceRegistry::new(Arc::clone(&db))),
            Arc::clone(&clock),
        ));

        let projector = Arc::new(
            TaskProgressProjector::new(session_repo.clone(), task_repo.clone())
                .with_clock(Arc::clone(&clock)),
        );

        let sessions = Arc::new(
            SessionService::new(session_repo.clone(), Arc::clone(&clock))
                .with_projector(Arc::clone(&projector))
                .with_resolver(resolver.clone())
                .with_single_active_session(config.sync.enforce_single_active_session),
        );
        let session_fields =
            Arc::new(FieldMutationService::new(session_repo, resolver.clone(), Arc::clone(&clock)));
        let tasks = Arc::new(FieldMutationService::new(task_repo, resolver.clone(), Arc::clone(&clock)));
        let notes = Arc::new(FieldMutationService::new(note_repo, resolver.clone(), Arc::clone(&clock)));
        let reminder_fields = Arc::new(FieldMutationService::new(
            reminder_repo.clone(),
            resolver.clone(),
            Arc::clone(&clock),
        ));
        let reminders = Arc::new(ReminderService::new(reminder_repo, clock).with_resolver(resolver));

        let transport = build_transport(&config.scheduler)?;
        let dispatcher = Arc::new(ReminderDispatcher::new(
            Arc::clone(&reminders),
            transport,
            format!("pomosync-{}", std::process::id()),
            dispatcher_config(&config.scheduler),
        ));
        let scheduler_metrics = Arc::new(SchedulerMetrics::new());
        let worker = ReminderWorker::new(
            Arc::clone(&dispatcher),
            ReminderWorkerConfig::from(&config.scheduler),
            Arc::clone(&scheduler_metrics),
        );

        info!(
            database = %db.path().display(),
            scheduler_enabled = config.scheduler.enabled,
            record_conflicts = config.sync.record_conflicts,
            single_active_session = config.sync.enforce_single_active_session,
            "application context ready"
        );

        Ok(Self {
            config,
            db,
            sessions,
            session_fields,
            tasks,
            notes,
            reminders,
            reminder_fields,
            projector,
            conflict_log,
            sync,
            dispatcher,
            scheduler_metrics,
            worker: Mutex::new(worker),
        })
    }

    /// Start the reminder worker if the scheduler is enabled.
    ///
    /// Returns whether a worker is running afterwards.
    pub async fn start_scheduler(&self) -> Result<bool> {
        if !self.config.scheduler.enabled {
            info!("reminder scheduler disabled by configuration");
            return Ok(false);
        }

        let mut worker = self.worker.lock().await;
        if worker.is_running() {
            debug!("reminder scheduler already running");
            return Ok(true);
        }
        worker.start()?;
        Ok(true)
    }

    pub async fn scheduler_running(&self) -> bool {
        self.worker.lock().await.is_running()
    }

    /// Stop background work. Safe to call more than once.
    pub async fn shutdown(&self) -> Result<()> {
        let mut worker = self.worker.lock().await;
        if worker.is_running() {
            worker.stop().await?;
        }
        info!("application context shut down");
        Ok(())
    }

    /// Ping the database and report scheduler state.
    pub async fn health_check(&self) -> HealthStatus {
        let db = Arc::clone(&self.db);
        let database = match tokio::task::spawn_blocking(move || db.health_check()).await {
            Ok(Ok(())) => ComponentHealth::healthy("database"),
            Ok(Err(err)) => ComponentHealth::unhealthy("database", err.to_string()),
            Err(err) => ComponentHealth::unhealthy("database", format!("health task failed: {err}")),
        };

        let scheduler = if !self.config.scheduler.enabled {
            ComponentHealth::healthy("reminder_scheduler").with_message("disabled")
        } else if self.scheduler_running().await {
            ComponentHealth::healthy("reminder_scheduler")
        } else {
            ComponentHealth::unhealthy("reminder_scheduler", "worker not running")
        };

        let mut status = HealthStatus::new().add_component(database).add_component(scheduler);
        status.calculate_score();
        if !status.is_healthy {
            warn!(score = status.score, "health check degraded");
        }
        status
    }
}

fn build_transport(config: &SchedulerConfig) -> Result<Arc<dyn DeliveryTransport>> {
    match config.webhook_url.as_deref().map(str::trim).filter(|url| !url.is_empty()) {
        Some(url) => {
            let timeout = Duration::from_secs(config.delivery_timeout_secs.max(1));
            let transport = WebhookTransport::new(url, timeout)?;
            info!(endpoint = %transport.endpoint(), "delivering reminders via webhook");
            Ok(Arc::new(transport))
        }
        None => {
            info!("no webhook configured, reminders will be logged");
            Ok(Arc::new(LogTransport))
        }
    }
}
