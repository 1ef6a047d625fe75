use axum::{
    extract::{FromRef, Path, State},
    routing::get,
    Form, Json, Router,
};
use axum_extra::extract::WithRejection;
use tracing::{info, instrument, warn};

use super::{
    dto::{ShareForm, SharePage, SharedFolder},
    token::{parse_duration_days, ShareKeys, MAX_SHARE_DAYS},
};
use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    folders::handlers::{ensure_owner, load_folder},
    state::AppState,
};

pub fn share_routes() -> Router<AppState> {
    Router::new()
        .route("/share-folder/:id", get(share_page).post(create_share_link))
        .route("/share/:token", get(open_shared_folder))
}

#[instrument(skip(state))]
pub async fn share_page(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> AppResult<Json<SharePage>> {
    let folder = load_folder(&state, id).await?;
    Ok(Json(SharePage {
        folder_id: folder.id,
        folder_name: folder.name,
        share_link: None,
        expires_at: None,
    }))
}

#[instrument(skip(state, user, form), fields(user_id = user.id))]
pub async fn create_share_link(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
    WithRejection(Form(form), _): WithRejection<Form<ShareForm>, AppError>,
) -> AppResult<Json<SharePage>> {
    let folder = load_folder(&state, id).await?;
    ensure_owner(&folder, user.id)?;

    let ttl = parse_duration_days(&form.duration).ok_or_else(|| {
        AppError::validation(format!(
            "duration must be a whole number of days between 1 and {MAX_SHARE_DAYS}"
        ))
    })?;

    let keys = ShareKeys::from_ref(&state);
    let (token, expires_at) = keys.issue(folder.id, ttl)?;
    info!(folder_id = folder.id, %expires_at, "share link issued");

    Ok(Json(SharePage {
        folder_id: folder.id,
        folder_name: folder.name,
        share_link: Some(format!("{}/share/{token}", state.config.share.base_url)),
        expires_at: Some(expires_at),
    }))
}

#[instrument(skip(state, token))]
pub async fn open_shared_folder(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<SharedFolder>> {
    let keys = ShareKeys::from_ref(&state);
    let claims = keys.verify(&token).map_err(|e| {
        warn!(error = %e, "share token rejected");
        AppError::Unauthorized
    })?;

    let folder = load_folder(&state, claims.sub).await?;
    let files = state.catalog.list_files_in_folder(folder.id).await?;
    let expires_at = time::OffsetDateTime::from_unix_timestamp(claims.exp)
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok(Json(SharedFolder {
        folder,
        files,
        expires_at,
    }))
}
