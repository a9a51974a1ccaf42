//! Redis availability checks

use std::time::Duration;

use uuid::Uuid;

pub const DEFAULT_TEST_REDIS_URL: &str = "redis://127.0.0.1:6379";

pub fn test_redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_TEST_REDIS_URL.to_string())
}

/// The test Redis URL if a server answers PING within two seconds
pub async fn try_redis_url() -> Option<String> {
    let url = test_redis_url();
    let client = redis::Client::open(url.as_str()).ok()?;

    let ping = async {
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await
    };

    match tokio::time::timeout(Duration::from_secs(2), ping).await {
        Ok(Ok(_)) => Some(url),
        _ => None,
    }
}

/// A stream key no other test run will collide with
pub fn unique_channel(prefix: &str) -> String {
    format!("{prefix}:test:{}", Uuid::new_v4().simple())
}
