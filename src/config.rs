use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Signs the session cookie and share tokens. `None` means a random
    /// per-process key.
    pub secret: Option<String>,
    pub ttl_minutes: i64,
    pub sweep_secs: u64,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShareConfig {
    pub issuer: String,
    pub audience: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub session: SessionConfig,
    pub upload: UploadConfig,
    pub share: ShareConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;
        let port = parse_or(&lookup, "PORT", 3000u16)?;

        let session = SessionConfig {
            secret: lookup("SESSION_SECRET").filter(|s| !s.is_empty()),
            ttl_minutes: parse_or(&lookup, "SESSION_TTL_MINUTES", 60 * 24)?,
            sweep_secs: parse_or(&lookup, "SESSION_SWEEP_SECS", 120)?,
            cookie_secure: lookup("SESSION_COOKIE_SECURE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        };

        let upload = UploadConfig {
            dir: lookup("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("uploads")),
            max_bytes: parse_or(&lookup, "UPLOAD_MAX_BYTES", 50 * 1024 * 1024)?,
        };

        let share = ShareConfig {
            issuer: lookup("SHARE_ISSUER").unwrap_or_else(|| "foldershare".into()),
            audience: lookup("SHARE_AUDIENCE").unwrap_or_else(|| "foldershare-share".into()),
            base_url: lookup("PUBLIC_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| format!("http://localhost:{port}")),
        };

        Ok(Self {
            database_url,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            host: lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            session,
            upload,
            share,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}
