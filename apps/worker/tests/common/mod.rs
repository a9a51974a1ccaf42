//! Common test utilities for worker integration tests
//!
//! In-memory stand-ins for the database and the mail relay, plus a harness
//! that wires them to an [`ExportWorker`](openmusic_worker::ExportWorker)
//! over an in-memory queue.

#![allow(unused_imports)]
#![allow(dead_code)]

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
