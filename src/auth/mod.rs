use crate::state::AppState;
use axum::Router;

pub mod dto;
pub(crate) mod extractors;
pub mod handlers;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;

pub use extractors::{AuthUser, CurrentUser};

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
