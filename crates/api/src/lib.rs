//! # PomoSync API
//!
//! Application layer: wiring and process entry point.
//!
//! This crate contains:
//! - Application context (dependency injection)
//! - Tracing setup and health reporting
//!
//! ## Architecture
//! - Depends on `domain`, `core`, and `infra`
//! - Wires up the hexagonal architecture

pub mod context;
pub mod utils;

pub use context::*;
