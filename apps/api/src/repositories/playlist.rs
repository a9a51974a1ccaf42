//! Playlist ownership lookups

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::{ApiError, ApiResult};

/// Decides whether a user may export a playlist
///
/// Only the owner passes. Collaborators are rejected like any other user.
#[async_trait]
pub trait PlaylistOwnershipVerifier: Send + Sync {
    /// Fails with [`ApiError::NotFound`] for an unknown playlist and with
    /// [`ApiError::Forbidden`] when `requester_id` is not its owner
    async fn verify_owner(&self, playlist_id: &str, requester_id: &str) -> ApiResult<()>;
}

/// Repository for playlist database reads
#[derive(Clone)]
pub struct PlaylistRepository {
    pool: PgPool,
}

impl PlaylistRepository {
    /// Create a new PlaylistRepository instance
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Owner of a playlist, or `None` if the playlist does not exist
    pub async fn find_owner(&self, playlist_id: &str) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT owner FROM playlists WHERE id = $1")
            .bind(playlist_id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[async_trait]
impl PlaylistOwnershipVerifier for PlaylistRepository {
    async fn verify_owner(&self, playlist_id: &str, requester_id: &str) -> ApiResult<()> {
        let owner = self
            .find_owner(playlist_id)
            .await
            .map_err(|e| match e {
                sqlx::Error::PoolTimedOut => ApiError::DatabaseUnavailable,
                other => ApiError::Database(other),
            })?
            .ok_or_else(|| ApiError::not_found("playlist", playlist_id))?;

        check_owner(&owner, playlist_id, requester_id)
    }
}

pub(crate) fn check_owner(owner: &str, playlist_id: &str, requester_id: &str) -> ApiResult<()> {
    if owner == requester_id {
        Ok(())
    } else {
        tracing::debug!(playlist_id, requester_id, "Export requested by non-owner");
        Err(ApiError::Forbidden(
            "you are not the owner of this playlist".to_string(),
        ))
    }
}
