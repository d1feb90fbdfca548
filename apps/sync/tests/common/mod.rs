//! Common test utilities for sync integration tests
//!
//! Shared fixtures and an in-memory catalog service so import runs can be
//! driven without a network or a database.

#![allow(unused_imports)]
#![allow(dead_code)]

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
