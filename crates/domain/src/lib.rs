//! # PomoSync Domain
//!
//! Business domain types for PomoSync.
//!
//! This crate contains:
//! - Synchronized records (sessions, tasks, notes, reminders) and their
//!   optimistic-concurrency envelope
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other PomoSync crates
//! - Pure data structures and field validation

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
