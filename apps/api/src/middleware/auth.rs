//! Authentication extractor for Axum handlers
//!
//! [`AuthUser`] requires a valid `Authorization: Bearer <JWT>` header and
//! rejects the request with 401 otherwise. The [`AuthService`] that checks
//! the token is looked up in the request extensions.
//!
//! # Usage
//!
//! ```rust,ignore
//! async fn protected_handler(auth: AuthUser) -> impl IntoResponse {
//!     format!("Hello, {}!", auth.user_id)
//! }
//! ```

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::models::Claims;
use crate::services::AuthService;

/// Authenticated requester
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The token's `sub` claim
    pub user_id: String,
    pub claims: Claims,
}

/// Why authentication failed
#[derive(Debug)]
pub enum AuthRejection {
    /// No bearer token in the Authorization header
    MissingToken,
    /// Token failed verification
    InvalidToken(String),
    /// AuthService was not added to the router
    MissingServices,
}

impl From<AuthRejection> for ApiError {
    fn from(rejection: AuthRejection) -> Self {
        match rejection {
            AuthRejection::MissingToken => ApiError::Unauthorized,
            AuthRejection::InvalidToken(reason) => ApiError::InvalidToken(reason),
            AuthRejection::MissingServices => {
                ApiError::Configuration("authentication service not configured".to_string())
            }
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

/// Extract the bearer token from the Authorization header
fn extract_bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts).ok_or(AuthRejection::MissingToken)?;

        let auth_service = parts
            .extensions
            .get::<AuthService>()
            .ok_or(AuthRejection::MissingServices)?;

        let claims = auth_service
            .verify_access_token(token)
            .map_err(|e| AuthRejection::InvalidToken(e.to_string()))?;

        Ok(AuthUser {
            user_id: claims.sub.clone(),
            claims,
        })
    }
}
