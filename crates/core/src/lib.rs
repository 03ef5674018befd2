//! # PomoSync Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - The session lifecycle state machine
//! - Optimistic multi-device reconciliation and change pulls
//! - Reminder outcomes and the dispatch pass
//! - Port interfaces (traits) implemented by `pomosync-infra`
//!
//! ## Architecture Principles
//! - Only depends on `pomosync-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod clock;
pub mod errors;
pub mod reminders;
pub mod session;
pub mod sync;
pub mod tasks;

pub use clock::{Clock, MockClock, SystemClock};
pub use errors::{MutationError, MutationResult};
pub use reminders::{
    DeliveryError, DeliveryReceipt, DeliveryTransport, DispatchSummary, DispatcherConfig,
    FailureOutcome, Handled, ReminderDispatcher, ReminderRepository, ReminderService,
};
pub use session::{
    SessionEvent, SessionRepository, SessionService, SessionStateMachine, SessionTimer,
};
pub use sync::{
    ChangeFeed, ChangeFeeds, DeviceRegistry, FieldMutationService, NotePatch, Patch,
    ReminderPatch, SessionPatch, SoftDelete, SyncConflictLog, SyncConflictResolver, SyncService,
    TaskPatch, VersionedRepository,
};
pub use tasks::{NoteRepository, TaskProgressProjector, TaskRepository};
