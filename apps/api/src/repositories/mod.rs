//! Database access for the API
//!
//! The API only ever reads who owns a playlist; everything else about
//! playlists belongs to the catalog service.

pub mod playlist;

pub use playlist::{PlaylistOwnershipVerifier, PlaylistRepository};
