//! Time-bounded folder share links.
//!
//! A link carries a signed token naming one folder and an expiry. Holding a
//! valid token is enough to read that folder and its files through
//! `GET /share/:token`; nothing about the link is stored server-side.

mod dto;
pub mod handlers;
pub mod token;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::share_routes()
}
