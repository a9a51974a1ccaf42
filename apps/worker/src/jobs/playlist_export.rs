//! Playlist export job
//!
//! Aggregates the requested playlist and mails it to the address carried by
//! the job. Ownership was verified when the job was enqueued and is not
//! checked again here.

use openmusic_export_queue::ExportJob;

use crate::aggregator::PlaylistExport;
use crate::error::WorkerResult;
use crate::AppState;

/// Execute one playlist export
///
/// Returns the export that was sent so callers can log what went out.
pub async fn execute(state: &AppState, job: &ExportJob) -> WorkerResult<PlaylistExport> {
    tracing::info!(playlist_id = %job.playlist_id, "Exporting playlist");

    let export = state.aggregator.aggregate(&job.playlist_id).await?;
    state.sender.send(&job.target_email, &export).await?;

    tracing::info!(
        playlist_id = %export.id,
        songs = export.songs.len(),
        "Playlist export sent"
    );

    Ok(export)
}
