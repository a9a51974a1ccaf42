//! Request, response and token types for the OpenMusic API

pub mod auth;
pub mod export;

pub use auth::Claims;
pub use export::{ExportAccepted, ExportPlaylistRequest};
