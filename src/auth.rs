//! Header-based pseudo authentication
//!
//! The caller names itself in `x-user-id`; the id only has to belong to a
//! registered user. There are no tokens, signatures or expiry.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::Error;
use crate::models::UserId;
use crate::routes::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

const UNAUTHORIZED: &str = "Unauthorized: Missing or invalid user ID";

/// The authenticated caller, extracted from `x-user-id`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub UserId);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let unauthorized = || Error::Unauthorized(UNAUTHORIZED.to_string());

        let id: UserId = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .ok_or_else(unauthorized)?;

        match state.users.get(id).await? {
            Some(_) => Ok(AuthUser(id)),
            None => {
                tracing::debug!(id, "rejected request for unknown user");
                Err(unauthorized())
            }
        }
    }
}
