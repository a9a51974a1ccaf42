//! Common test utilities for API integration tests
//!
//! Builds the real router around an in-memory queue and an in-memory
//! ownership table so the HTTP surface can be exercised without Postgres
//! or Redis.

#![allow(dead_code, unused_imports)]

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
