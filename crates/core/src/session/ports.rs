//! Port interfaces for session persistence

use async_trait::async_trait;
use pomosync_domain::{Result, Session};
use uuid::Uuid;

use crate::sync::ports::VersionedRepository;

#[async_trait]
pub trait SessionRepository: VersionedRepository<Session> {
    /// An active or paused, non-deleted session of `owner_id`, other than
    /// `excluding` when given. Oldest first if several exist.
    async fn find_open_session_for_owner(
        &self,
        owner_id: Uuid,
        excluding: Option<Uuid>,
    ) -> Result<Option<Session>>;

    /// Non-deleted `work` sessions in `completed` status linked to `task_id`.
    async fn count_completed_work_sessions(&self, task_id: Uuid) -> Result<i64>;
}
