use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::state::AppState;

pub const MAX_SHARE_DAYS: i64 = 365;

/// Distinguishes share tokens from anything else signed with the same secret.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Share,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ShareClaims {
    pub sub: i64,        // folder ID
    pub iat: i64,        // issued at
    pub exp: i64,        // expiration time
    pub iss: String,     // issuer
    pub aud: String,     // audience
    pub kind: TokenKind, // always share
}

/// Holds share-token signing and verification keys with config data.
#[derive(Clone)]
pub struct ShareKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
}

impl FromRef<AppState> for ShareKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            &state.secret,
            &state.config.share.issuer,
            &state.config.share.audience,
        )
    }
}

impl ShareKeys {
    pub fn new(secret: &[u8], issuer: &str, audience: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
        }
    }

    /// Sign a token for `folder_id` valid for `ttl` from `now`.
    pub fn issue_at(
        &self,
        folder_id: i64,
        ttl: Duration,
        now: OffsetDateTime,
    ) -> anyhow::Result<(String, OffsetDateTime)> {
        let exp = now + ttl;
        let claims = ShareClaims {
            sub: folder_id,
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind: TokenKind::Share,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(folder_id, exp = claims.exp, "share token signed");
        Ok((token, exp))
    }

    pub fn issue(&self, folder_id: i64, ttl: Duration) -> anyhow::Result<(String, OffsetDateTime)> {
        self.issue_at(folder_id, ttl, OffsetDateTime::now_utc())
    }

    /// Check signature, issuer, audience and expiry.
    pub fn verify(&self, token: &str) -> anyhow::Result<ShareClaims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.leeway = 0;
        let data = decode::<ShareClaims>(token, &self.decoding, &validation)?;
        anyhow::ensure!(data.claims.kind == TokenKind::Share, "not a share token");
        debug!(folder_id = data.claims.sub, "share token verified");
        Ok(data.claims)
    }
}

/// Accept whole days in `1..=MAX_SHARE_DAYS`.
pub fn parse_duration_days(raw: &str) -> Option<Duration> {
    let days: i64 = raw.trim().parse().ok()?;
    (1..=MAX_SHARE_DAYS)
        .contains(&days)
        .then(|| Duration::days(days))
}
