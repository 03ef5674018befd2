//! Multi-device synchronization: version reconciliation, field edits and
//! change pulls

pub mod field_mutation;
pub mod ports;
pub mod resolver;
pub mod service;

pub use field_mutation::{
    FieldMutationService, NotePatch, Patch, ReminderPatch, SessionPatch, SoftDelete, TaskPatch,
};
pub use ports::{ChangeFeed, DeviceRegistry, SyncConflictLog, VersionedRepository};
pub use resolver::SyncConflictResolver;
pub use service::{ChangeFeeds, SyncService};
