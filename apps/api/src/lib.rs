//! OpenMusic API library
//!
//! Exposes the router and its building blocks so integration tests can
//! drive the HTTP surface without a running server.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use services::auth::{AuthConfig, AuthService};

use axum::{Extension, Router};

use routes::{export_router, health_router, ExportState, HealthState};
use services::{ExportService, HealthService};

/// Assemble the application routes
///
/// - `/export/playlists/:playlist_id`
/// - `/health`, `/health/live`, `/health/ready`
///
/// Tracing and CORS layers are added by the binary.
pub fn build_router(
    auth_service: AuthService,
    export_service: ExportService,
    health_service: HealthService,
) -> Router {
    Router::new()
        .nest("/export", export_router(ExportState::new(export_service)))
        .nest("/health", health_router(HealthState::new(health_service)))
        .layer(Extension(auth_service))
}
