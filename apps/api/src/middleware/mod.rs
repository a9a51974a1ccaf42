//! Middleware components for the OpenMusic API
//!
//! - `AuthUser`: requires a valid bearer token, returns 401 if missing or invalid

pub mod auth;

pub use auth::{AuthRejection, AuthUser};
