//! JWT claims carried by access tokens

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Issuer and audience every OpenMusic token carries
pub const TOKEN_ISSUER: &str = "openmusic";

/// Access token claims
///
/// `sub` is the user id as issued by the login service; the API treats it as
/// an opaque string and compares it to `playlists.owner` verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// Issued at timestamp (Unix epoch)
    pub iat: i64,

    /// Expiration timestamp (Unix epoch)
    pub exp: i64,

    /// Issuer
    #[serde(default = "default_issuer")]
    pub iss: String,

    /// Audience
    #[serde(default = "default_audience")]
    pub aud: String,
}

fn default_issuer() -> String {
    TOKEN_ISSUER.to_string()
}

fn default_audience() -> String {
    TOKEN_ISSUER.to_string()
}

impl Claims {
    /// Create claims for `user_id` valid for `ttl_secs` from now
    pub fn new(user_id: impl Into<String>, ttl_secs: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id.into(),
            iat: now,
            exp: now + ttl_secs,
            iss: default_issuer(),
            aud: default_audience(),
        }
    }

    /// Check if the token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}
