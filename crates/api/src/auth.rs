//! Caller identity forwarded by the upstream identity collaborator.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use common::UserId;

use crate::error::ApiError;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the admin flag.
pub const USER_ADMIN_HEADER: &str = "x-user-admin";

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl AuthUser {
    /// Reads the caller from request headers.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        let raw = headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("Missing user identity".to_string()))?
            .to_str()
            .map_err(|_| ApiError::Unauthorized("Invalid user identity".to_string()))?;

        let user_id = raw
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| ApiError::Unauthorized("Invalid user identity".to_string()))?;

        let is_admin = match headers.get(USER_ADMIN_HEADER) {
            None => false,
            Some(value) => value
                .to_str()
                .ok()
                .and_then(|v| v.trim().parse::<bool>().ok())
                .ok_or_else(|| ApiError::Unauthorized("Invalid admin flag".to_string()))?,
        };

        Ok(Self {
            user_id: UserId::new(user_id),
            is_admin,
        })
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = Self::from_headers(&parts.headers);
        if let Err(err) = &user {
            tracing::warn!(error = %err, "rejected request without valid identity");
        }
        user
    }
}
