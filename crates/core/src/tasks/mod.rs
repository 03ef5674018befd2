//! Tasks, notes and derived task progress

pub mod ports;
pub mod projector;

pub use ports::{NoteRepository, TaskRepository};
pub use projector::TaskProgressProjector;
