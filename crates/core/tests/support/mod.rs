//! Shared test helpers for `pomosync-core` integration tests.
//!
//! In-memory ports plus record builders, so service tests can focus on
//! behaviour instead of storage.

#![allow(dead_code)]

pub mod fixtures;
pub mod repositories;
