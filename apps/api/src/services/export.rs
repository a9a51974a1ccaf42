//! Export request gate
//!
//! Checks an export request and turns it into one message on the export
//! channel. Nothing here waits for the export itself; the caller learns only
//! that the job was accepted.

use std::sync::Arc;

use lettre::Address;
use openmusic_export_queue::{ExportJob, MessageQueue, EXPORT_PLAYLIST_CHANNEL};

use crate::error::{ApiError, ApiResult};
use crate::repositories::PlaylistOwnershipVerifier;

const MAX_EMAIL_LENGTH: usize = 254;
const MAX_LOCAL_PART_LENGTH: usize = 64;

/// Accepts playlist export requests and enqueues them
#[derive(Clone)]
pub struct ExportService {
    verifier: Arc<dyn PlaylistOwnershipVerifier>,
    queue: Arc<dyn MessageQueue>,
    channel: String,
}

impl ExportService {
    pub fn new(verifier: Arc<dyn PlaylistOwnershipVerifier>, queue: Arc<dyn MessageQueue>) -> Self {
        Self {
            verifier,
            queue,
            channel: EXPORT_PLAYLIST_CHANNEL.to_string(),
        }
    }

    /// Publish to `channel` instead of the default export channel
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Validate, authorize and enqueue one export
    ///
    /// Input is validated before any storage access. On success exactly one
    /// [`ExportJob`] is on the channel; on any error nothing was published.
    pub async fn request_export(
        &self,
        playlist_id: &str,
        requester_id: &str,
        target_email: &str,
    ) -> ApiResult<ExportJob> {
        if playlist_id.trim().is_empty() {
            return Err(ApiError::ValidationError(
                "playlistId must not be empty".to_string(),
            ));
        }

        let target_email = target_email.trim();
        if !is_valid_email(target_email) {
            return Err(ApiError::ValidationError(
                "targetEmail must be a valid email address".to_string(),
            ));
        }

        self.verifier.verify_owner(playlist_id, requester_id).await?;

        let job = ExportJob::new(playlist_id, target_email);
        let payload = job.to_payload()?;
        self.queue.publish(&self.channel, &payload).await?;

        tracing::info!(playlist_id, requester_id, "Playlist export queued");
        tracing::debug!(playlist_id, target_email, "Export destination");

        Ok(job)
    }
}

/// Check the address against the mail grammar the worker sends with
///
/// Expects an already trimmed value. On top of what [`Address`] accepts, the
/// address must fit in 254 characters, the local part in 64, and the domain
/// must be dotted.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LENGTH {
        return false;
    }

    let Ok(address) = email.parse::<Address>() else {
        return false;
    };
    if address.user().len() > MAX_LOCAL_PART_LENGTH {
        return false;
    }

    let domain = address.domain();
    domain.contains('.') && domain.split('.').all(|label| !label.is_empty())
}
