use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::{cookie::Key, SignedCookieJar};
use time::OffsetDateTime;
use tracing::debug;

use crate::auth::repo_types::User;
use crate::error::AppError;
use crate::sessions;
use crate::state::AppState;

/// The logged-in user, if the request carries a live session.
pub struct CurrentUser(pub Option<User>);

/// The logged-in user; rejects with `401` otherwise.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = SignedCookieJar::from_headers(&parts.headers, Key::from_ref(state));
        let Some(session_id) = sessions::session_id(&jar) else {
            return Ok(CurrentUser(None));
        };

        let record = state
            .sessions
            .load(session_id)
            .await?
            .filter(|r| !r.is_expired_at(OffsetDateTime::now_utc()));
        let Some(record) = record else {
            debug!(%session_id, "session missing or expired");
            return Ok(CurrentUser(None));
        };
        let Some(user_id) = record.data.user_id else {
            return Ok(CurrentUser(None));
        };

        let user = state.users.find_by_id(user_id).await?;
        if user.is_none() {
            debug!(%session_id, user_id, "session user no longer exists");
        }
        Ok(CurrentUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        user.map(AuthUser).ok_or(AppError::Unauthorized)
    }
}
