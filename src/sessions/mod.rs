//! Server-side sessions.
//!
//! The browser only holds a signed `sid` cookie carrying a random session id.
//! The id resolves to a [`SessionRecord`] in a [`SessionStore`], whose `data`
//! says which user is logged in. Expired rows are ignored on load and removed
//! by the [`sweeper`].

pub mod repo;
pub mod sweeper;

use async_trait::async_trait;
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    SignedCookieJar,
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::AppResult;

pub const SESSION_COOKIE: &str = "sid";

/// Payload persisted in the `data` column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: Uuid,
    pub data: SessionData,
    pub expires_at: OffsetDateTime,
}

impl SessionRecord {
    pub fn for_user(user_id: i64, ttl: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            data: SessionData {
                user_id: Some(user_id),
            },
            expires_at: OffsetDateTime::now_utc() + ttl,
        }
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert or replace a record.
    async fn save(&self, record: &SessionRecord) -> AppResult<()>;
    /// Fetch a record that has not expired yet.
    async fn load(&self, id: Uuid) -> AppResult<Option<SessionRecord>>;
    async fn destroy(&self, id: Uuid) -> AppResult<()>;
    /// Remove every expired record, returning how many went.
    async fn delete_expired(&self) -> AppResult<u64>;
}

/// Read the session id from a verified cookie. Unsigned or tampered cookies
/// never reach this point because the jar drops them.
pub fn session_id(jar: &SignedCookieJar) -> Option<Uuid> {
    jar.get(SESSION_COOKIE)
        .and_then(|c| Uuid::parse_str(c.value()).ok())
}

pub fn session_cookie(id: Uuid, ttl: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(ttl)
        .build()
}

pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}
