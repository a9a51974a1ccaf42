//! Playlist aggregation
//!
//! Turns a playlist id into the document that gets mailed: the playlist's
//! id and name plus its songs. Reads go through [`PlaylistStore`] so the
//! consumer can be exercised without a database.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::{WorkerError, WorkerResult};

const PLAYLIST_QUERY: &str = "SELECT id, name FROM playlists WHERE id = $1";

// Outer join so an empty playlist yields no rows instead of an error. No
// ORDER BY: songs come back in the join's row order.
const SONGS_QUERY: &str = r#"
    SELECT s.id, s.title, s.performer
    FROM songs s
    LEFT JOIN playlist_songs ps ON ps.song_id = s.id
    WHERE ps.playlist_id = $1
"#;

/// Playlist identity row
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PlaylistRecord {
    pub id: String,
    pub name: String,
}

/// A song as it appears in an export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExportSong {
    pub id: String,
    pub title: String,
    pub performer: String,
}

/// Everything an export mail carries about one playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistExport {
    pub id: String,
    pub name: String,
    pub songs: Vec<ExportSong>,
}

/// Whether the two reads behind an export see the same snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadConsistency {
    /// Two independent reads; a concurrent edit can land between them
    #[default]
    BestEffort,
    /// Both reads in one read-only repeatable-read transaction
    Snapshot,
}

/// Read access to playlists and their songs
#[async_trait]
pub trait PlaylistStore: Send + Sync {
    async fn find_playlist(&self, playlist_id: &str) -> WorkerResult<Option<PlaylistRecord>>;

    async fn find_songs(&self, playlist_id: &str) -> WorkerResult<Vec<ExportSong>>;

    /// Read playlist and songs from one consistent snapshot
    ///
    /// Stores without transactions fall back to two plain reads.
    async fn snapshot(
        &self,
        playlist_id: &str,
    ) -> WorkerResult<Option<(PlaylistRecord, Vec<ExportSong>)>> {
        let Some(playlist) = self.find_playlist(playlist_id).await? else {
            return Ok(None);
        };
        let songs = self.find_songs(playlist_id).await?;
        Ok(Some((playlist, songs)))
    }
}

/// [`PlaylistStore`] backed by PostgreSQL
#[derive(Clone)]
pub struct PgPlaylistStore {
    pool: PgPool,
}

impl PgPlaylistStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlaylistStore for PgPlaylistStore {
    async fn find_playlist(&self, playlist_id: &str) -> WorkerResult<Option<PlaylistRecord>> {
        let playlist = sqlx::query_as::<_, PlaylistRecord>(PLAYLIST_QUERY)
            .bind(playlist_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(playlist)
    }

    async fn find_songs(&self, playlist_id: &str) -> WorkerResult<Vec<ExportSong>> {
        let songs = sqlx::query_as::<_, ExportSong>(SONGS_QUERY)
            .bind(playlist_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(songs)
    }

    async fn snapshot(
        &self,
        playlist_id: &str,
    ) -> WorkerResult<Option<(PlaylistRecord, Vec<ExportSong>)>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let playlist = sqlx::query_as::<_, PlaylistRecord>(PLAYLIST_QUERY)
            .bind(playlist_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(playlist) = playlist else {
            tx.rollback().await?;
            return Ok(None);
        };

        let songs = sqlx::query_as::<_, ExportSong>(SONGS_QUERY)
            .bind(playlist_id)
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some((playlist, songs)))
    }
}

/// Builds [`PlaylistExport`]s from a [`PlaylistStore`]
#[derive(Clone)]
pub struct PlaylistAggregator {
    store: Arc<dyn PlaylistStore>,
    consistency: ReadConsistency,
}

impl PlaylistAggregator {
    pub fn new(store: Arc<dyn PlaylistStore>) -> Self {
        Self {
            store,
            consistency: ReadConsistency::default(),
        }
    }

    pub fn with_consistency(mut self, consistency: ReadConsistency) -> Self {
        self.consistency = consistency;
        self
    }

    /// Collect the playlist and its songs
    ///
    /// Fails with [`WorkerError::NotFound`] when the playlist is gone; an
    /// existing playlist without songs gives an empty `songs` list.
    pub async fn aggregate(&self, playlist_id: &str) -> WorkerResult<PlaylistExport> {
        let (playlist, songs) = match self.consistency {
            ReadConsistency::BestEffort => {
                let playlist = self
                    .store
                    .find_playlist(playlist_id)
                    .await?
                    .ok_or_else(|| WorkerError::playlist_not_found(playlist_id))?;
                let songs = self.store.find_songs(playlist_id).await?;
                (playlist, songs)
            }
            ReadConsistency::Snapshot => self
                .store
                .snapshot(playlist_id)
                .await?
                .ok_or_else(|| WorkerError::playlist_not_found(playlist_id))?,
        };

        tracing::debug!(
            playlist_id = %playlist.id,
            songs = songs.len(),
            consistency = ?self.consistency,
            "Aggregated playlist"
        );

        Ok(PlaylistExport {
            id: playlist.id,
            name: playlist.name,
            songs,
        })
    }
}
