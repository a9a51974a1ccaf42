//! Shared test utilities for the OpenMusic workspace
//!
//! Integration tests in the API, worker and queue crates need a Postgres
//! database and sometimes a Redis broker. Neither is guaranteed to be
//! running, so every helper here returns `Option` and the [`require_db!`]
//! and [`require_redis!`] macros skip the calling test when the service
//! is missing.
//!
//! # Example
//!
//! ```rust,ignore
//! use openmusic_test_utils::{require_db, PlaylistFixture};
//!
//! #[tokio::test]
//! async fn test_with_database() {
//!     require_db!(pool);
//!
//!     let playlist = PlaylistFixture::new("user-1").with_songs(3);
//!     playlist.insert(&pool).await.unwrap();
//! }
//! ```

mod postgres;
mod redis;

pub use postgres::{
    create_schema, test_database_url, try_create_test_pool, PlaylistFixture, SongFixture,
    DEFAULT_TEST_DATABASE_URL,
};
pub use redis::{test_redis_url, try_redis_url, unique_channel, DEFAULT_TEST_REDIS_URL};

/// Bind a Postgres pool with the test schema in place, or skip the test
#[macro_export]
macro_rules! require_db {
    ($pool_var:ident) => {
        let $pool_var = match $crate::try_create_test_pool().await {
            Some(p) => p,
            None => {
                eprintln!("Skipping test: database not available");
                return;
            }
        };
    };
}

/// Bind the URL of a reachable Redis server, or skip the test
#[macro_export]
macro_rules! require_redis {
    ($url_var:ident) => {
        let $url_var = match $crate::try_redis_url().await {
            Some(url) => url,
            None => {
                eprintln!("Skipping test: redis not available");
                return;
            }
        };
    };
}
