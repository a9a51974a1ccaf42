//! Export job wire format

use serde::{Deserialize, Serialize};

use crate::error::{QueueError, QueueResult};

/// Channel the API publishes playlist export jobs to
pub const EXPORT_PLAYLIST_CHANNEL: &str = "export:playlist";

/// Default channel for terminally failed export jobs
pub const EXPORT_DEAD_LETTER_CHANNEL: &str = "export:playlist:dead";

/// One playlist export request, as it travels through the queue
///
/// Serialized as `{"playlistId": "...", "targetEmail": "..."}`. The API
/// checks ownership and the email grammar before publishing; the worker
/// trusts both fields as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportJob {
    /// Playlist to export
    pub playlist_id: String,

    /// Address the export is mailed to
    pub target_email: String,
}

impl ExportJob {
    pub fn new(playlist_id: impl Into<String>, target_email: impl Into<String>) -> Self {
        Self {
            playlist_id: playlist_id.into(),
            target_email: target_email.into(),
        }
    }

    /// Encode the job as the JSON message body
    pub fn to_payload(&self) -> QueueResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a message body back into a job
    ///
    /// Fails on invalid JSON, missing fields, or an empty playlist id.
    pub fn from_payload(payload: &[u8]) -> QueueResult<Self> {
        let job: Self = serde_json::from_slice(payload)?;
        if job.playlist_id.trim().is_empty() {
            return Err(QueueError::Serialization(
                <serde_json::Error as serde::de::Error>::custom("playlistId must not be empty"),
            ));
        }
        Ok(job)
    }
}
