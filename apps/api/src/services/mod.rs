//! Business logic for the OpenMusic API

pub mod auth;
pub mod export;
pub mod health;

pub use auth::{AuthConfig, AuthService};
pub use export::{is_valid_email, ExportService};
pub use health::{HealthCheck, HealthService, PostgresCheck, RedisCheck};
