use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha512};
use sqlx::PgPool;
use tracing::warn;

use crate::auth::repo::{PgUserStore, UserStore};
use crate::catalog::{Catalog, PgCatalog};
use crate::config::{AppConfig, SessionConfig};
use crate::sessions::{repo::PgSessionStore, SessionStore};
use crate::storage::Storage;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub catalog: Arc<dyn Catalog>,
    pub sessions: Arc<dyn SessionStore>,
    pub storage: Arc<Storage>,
    /// 64 bytes shared by the cookie key and share-token signing.
    pub secret: Arc<[u8]>,
}

impl AppState {
    pub async fn init(config: Arc<AppConfig>, db: PgPool) -> anyhow::Result<Self> {
        let storage = Arc::new(Storage::new(config.upload.dir.clone()).await?);
        let secret = signing_secret(&config.session);

        Ok(Self::from_parts(
            config,
            Arc::new(PgUserStore::new(db.clone())),
            Arc::new(PgCatalog::new(db.clone())),
            Arc::new(PgSessionStore::new(db)),
            storage,
            secret,
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        catalog: Arc<dyn Catalog>,
        sessions: Arc<dyn SessionStore>,
        storage: Arc<Storage>,
        secret: Arc<[u8]>,
    ) -> Self {
        Self {
            config,
            users,
            catalog,
            sessions,
            storage,
            secret,
        }
    }

    pub fn session_ttl(&self) -> time::Duration {
        time::Duration::minutes(self.config.session.ttl_minutes)
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        Key::from(state.secret.as_ref())
    }
}

/// Stretch `SESSION_SECRET` to the 64 bytes a cookie [`Key`] needs. Without a
/// secret every restart gets a fresh random key.
pub fn signing_secret(cfg: &SessionConfig) -> Arc<[u8]> {
    match &cfg.secret {
        Some(secret) => Sha512::digest(secret.as_bytes()).to_vec().into(),
        None => {
            warn!("SESSION_SECRET is not set; using a random key, sessions and share links end at restart");
            let mut bytes = vec![0u8; 64];
            OsRng.fill_bytes(&mut bytes);
            bytes.into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_cfg(secret: Option<&str>) -> SessionConfig {
        SessionConfig {
            secret: secret.map(str::to_string),
            ttl_minutes: 60,
            sweep_secs: 120,
            cookie_secure: false,
        }
    }

    #[test]
    fn configured_secret_is_stable_and_64_bytes() {
        let a = signing_secret(&session_cfg(Some("hunter2")));
        let b = signing_secret(&session_cfg(Some("hunter2")));
        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        assert_ne!(a, signing_secret(&session_cfg(Some("hunter3"))));
    }

    #[test]
    fn missing_secret_is_random() {
        let a = signing_secret(&session_cfg(None));
        let b = signing_secret(&session_cfg(None));
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }
}
