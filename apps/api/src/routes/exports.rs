//! Playlist export endpoint
//!
//! - `POST /export/playlists/:playlist_id` - queue an export of the playlist
//!   to `targetEmail`; answers 201 as soon as the job is on the queue

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::models::{ExportAccepted, ExportPlaylistRequest};
use crate::services::ExportService;

/// Shared state for export handlers
#[derive(Clone)]
pub struct ExportState {
    pub export_service: ExportService,
}

impl ExportState {
    pub fn new(export_service: ExportService) -> Self {
        Self { export_service }
    }
}

/// Create the export router, nested under `/export`
pub fn export_router(state: ExportState) -> Router {
    Router::new()
        .route("/playlists/:playlist_id", post(export_playlist))
        .with_state(state)
}

async fn export_playlist(
    State(state): State<ExportState>,
    auth: AuthUser,
    Path(playlist_id): Path<String>,
    body: Result<Json<ExportPlaylistRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ExportAccepted>)> {
    let Json(request) = body.map_err(|e| ApiError::InvalidBody(e.body_text()))?;

    state
        .export_service
        .request_export(&playlist_id, &auth.user_id, &request.target_email)
        .await?;

    Ok((StatusCode::CREATED, Json(ExportAccepted::new())))
}
