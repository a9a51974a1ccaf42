//! Access token verification
//!
//! Tokens are issued by the OpenMusic login service and signed with the
//! shared HS256 secret. The API only verifies them; [`AuthService::issue_access_token`]
//! exists for tooling and tests that need a valid token.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::error::{ApiError, ApiResult};
use crate::models::auth::{Claims, TOKEN_ISSUER};

/// Authentication service configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// JWT signing secret
    pub jwt_secret: String,
    /// Access token TTL in seconds (default: 15 minutes)
    pub access_token_ttl_secs: i64,
    /// JWT issuer
    pub issuer: String,
    /// JWT audience
    pub audience: String,
}

impl AuthConfig {
    /// Create a new AuthConfig with the default TTL
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            access_token_ttl_secs: 15 * 60,
            issuer: TOKEN_ISSUER.to_string(),
            audience: TOKEN_ISSUER.to_string(),
        }
    }
}

/// Verifies bearer tokens
#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Verify an access token and return its claims
    ///
    /// Checks signature, expiry, issuer and audience.
    pub fn verify_access_token(&self, token: &str) -> ApiResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            tracing::debug!(error = %e, "Access token verification failed");
            ApiError::InvalidToken(e.to_string())
        })?;

        Ok(token_data.claims)
    }

    /// Sign an access token for `user_id`
    pub fn issue_access_token(&self, user_id: &str) -> ApiResult<String> {
        let mut claims = Claims::new(user_id, self.config.access_token_ttl_secs);
        claims.iss = self.config.issuer.clone();
        claims.aud = self.config.audience.clone();
        self.sign(&claims)
    }

    /// Sign arbitrary claims with the configured secret
    pub fn sign(&self, claims: &Claims) -> ApiResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| ApiError::Internal(format!("failed to sign token: {}", e)))
    }
}
