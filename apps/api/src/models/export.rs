//! Export endpoint bodies

use serde::{Deserialize, Serialize};

/// Body of `POST /export/playlists/{playlistId}`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPlaylistRequest {
    pub target_email: String,
}

/// Body returned once the export job is on the queue
#[derive(Debug, Clone, Serialize)]
pub struct ExportAccepted {
    pub status: &'static str,
    pub message: String,
}

impl ExportAccepted {
    pub fn new() -> Self {
        Self {
            status: "success",
            message: "Your export request is being processed".to_string(),
        }
    }
}

impl Default for ExportAccepted {
    fn default() -> Self {
        Self::new()
    }
}
