use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use course_core::model::{User, UserId};

use crate::AppState;
use crate::error::ApiError;

/// Header the upstream gateway forwards the authenticated user id in.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The caller, resolved against the user directory.
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<UserId>().ok())
            .ok_or_else(ApiError::unauthorized)?;
        let user = state.services.access().resolve(user_id).await?;
        Ok(CurrentUser(user))
    }
}
