//! HTTP route handlers for the OpenMusic API
//!
//! - Playlist export requests
//! - Health check and readiness endpoints

pub mod exports;
pub mod health;

pub use exports::{export_router, ExportState};
pub use health::{health_router, HealthState};
