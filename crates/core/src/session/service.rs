//! Session use cases: creation and status mutations from client devices

use std::sync::Arc;

use pomosync_domain::{NewSession, PomoSyncError, Result, Session, SessionStatus, Versioned};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::ports::SessionRepository;
use super::state_machine::{SessionEvent, SessionStateMachine};
use super::timer::SessionTimer;
use crate::clock::Clock;
use crate::errors::{MutationError, MutationResult};
use crate::sync::resolver::SyncConflictResolver;
use crate::tasks::projector::TaskProgressProjector;

pub struct SessionService {
    sessions: Arc<dyn SessionRepository>,
    projector: Option<Arc<TaskProgressProjector>>,
    resolver: SyncConflictResolver,
    clock: Arc<dyn Clock>,
    enforce_single_active_session: bool,
}

impl SessionService {
    pub fn new(sessions: Arc<dyn SessionRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions,
            projector: None,
            resolver: SyncConflictResolver::new(),
            clock,
            enforce_single_active_session: true,
        }
    }

    /// Recount task progress whenever a linked work session completes.
    pub fn with_projector(mut self, projector: Arc<TaskProgressProjector>) -> Self {
        self.projector = Some(projector);
        self
    }

    pub fn with_resolver(mut self, resolver: SyncConflictResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_single_active_session(mut self, enforce: bool) -> Self {
        self.enforce_single_active_session = enforce;
        self
    }

    /// Create a session in `planned` status.
    #[instrument(skip(self, input), fields(owner_id = %input.owner_id))]
    pub async fn create_session(&self, input: NewSession) -> Result<Session> {
        let session = Session::plan(input, self.clock.now());
        session.validate()?;
        self.sessions.insert(&session).await?;
        info!(session_id = %session.id, session_type = %session.session_type, "session planned");
        Ok(session)
    }

    /// Fetch a live (not soft-deleted) session.
    pub async fn get_session(&self, session_id: Uuid) -> Result<Session> {
        match self.sessions.get(session_id).await? {
            Some(session) if !session.is_deleted() => Ok(session),
            _ => Err(PomoSyncError::not_found("session", &session_id.to_string())),
        }
    }

    /// The owner's open (active or paused) session, if any.
    pub async fn get_active_session(&self, owner_id: Uuid) -> Result<Option<Session>> {
        self.sessions.find_open_session_for_owner(owner_id, None).await
    }

    /// Live countdown for an open session owned by `owner_id`.
    #[instrument(skip(self))]
    pub async fn get_session_timer(&self, owner_id: Uuid, session_id: Uuid) -> Result<SessionTimer> {
        let session = self.get_session(session_id).await?;
        if session.owner_id != owner_id {
            return Err(PomoSyncError::not_found("session", &session_id.to_string()));
        }
        SessionTimer::at(&session, self.clock.now())
    }

    /// Apply a client-requested status change.
    ///
    /// Checks run in order: version, transition legality, the single open
    /// session rule (entering `active` only). The write itself is a
    /// compare-and-swap, so a concurrent winner still surfaces as
    /// `SyncConflict`. The open-session lookup and the write are separate
    /// steps: two different sessions of one owner activated at the same
    /// instant can both pass.
    #[instrument(skip(self, note), fields(requested = %requested_status))]
    pub async fn submit_session_mutation(
        &self,
        session_id: Uuid,
        client_version: i64,
        device_id: &str,
        requested_status: SessionStatus,
        note: Option<&str>,
    ) -> MutationResult<Session> {
        let now = self.clock.now();
        let server = self.get_session(session_id).await?;

        if let Err(err) = SyncConflictResolver::check(&server, client_version) {
            self.resolver.record_rejection(&err, device_id, now).await;
            return Err(err);
        }

        let transition = SessionStateMachine::transition(&server, requested_status, now, note)?;

        if requested_status == SessionStatus::Active && self.enforce_single_active_session {
            if let Some(open) =
                self.sessions.find_open_session_for_owner(server.owner_id, Some(server.id)).await?
            {
                warn!(
                    session_id = %server.id,
                    open_session_id = %open.id,
                    "activation rejected, owner already has an open session"
                );
                return Err(MutationError::ActiveSessionExists {
                    owner_id: server.owner_id,
                    open_session_id: open.id,
                });
            }
        }

        let mut updated = transition.session;
        SyncConflictResolver::stamp(&mut updated, device_id, now);
        let saved = self
            .resolver
            .commit(self.sessions.as_ref(), updated, server.sync_version(), device_id, now)
            .await?;

        info!(
            session_id = %saved.id,
            from = %server.status,
            to = %saved.status,
            sync_version = saved.sync.sync_version,
            "session transitioned"
        );

        if let Some(event) = transition.event {
            self.dispatch(event).await;
        }

        Ok(saved)
    }

    async fn dispatch(&self, event: SessionEvent) {
        let Some(projector) = &self.projector else {
            return;
        };
        match event {
            SessionEvent::WorkSessionCompleted { session_id, task_id } => {
                // The session write already committed; a recount can be replayed.
                if let Err(err) = projector.recount(task_id).await {
                    warn!(
                        error = %err,
                        session_id = %session_id,
                        task_id = %task_id,
                        "task progress recount failed"
                    );
                }
            }
        }
    }
}
