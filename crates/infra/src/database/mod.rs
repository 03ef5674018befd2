//! SQLite persistence for every versioned record family

mod columns;
pub mod device_repository;
pub mod manager;
pub mod note_repository;
pub mod reminder_repository;
pub mod session_repository;
pub mod sync_conflict_repository;
pub mod task_repository;

pub use device_repository::*;
pub use manager::*;
pub use note_repository::*;
pub use reminder_repository::*;
pub use session_repository::*;
pub use sync_conflict_repository::*;
pub use task_repository::*;
