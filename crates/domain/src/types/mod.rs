//! Domain types and models

pub mod device;
pub mod note;
pub mod reminder;
pub mod session;
pub mod sync;
pub mod task;
pub mod versioned;

pub use device::SyncDevice;
pub use note::{NewNote, Note};
pub use reminder::{DeliveryMethod, NewReminder, Reminder, ReminderPriority, ReminderStatus};
pub use session::{NewSession, Session, SessionStatus, SessionType};
pub use sync::{ChangeSet, DeletedItem, SyncConflictRecord};
pub use task::{NewTask, Task};
pub use versioned::{EntityKind, SyncMetadata, Versioned};
