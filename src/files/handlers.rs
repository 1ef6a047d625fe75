use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    response::Redirect,
    routing::get,
    Json, Router,
};
use axum_extra::extract::WithRejection;
use tracing::instrument;

use super::{
    dto::{FileDetails, UploadPage},
    upload,
};
use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
};

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/files/:id", get(get_file))
}

pub fn write_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/upload", get(upload_page).post(upload_file))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn upload_page(State(state): State<AppState>) -> AppResult<Json<UploadPage>> {
    let folders = state.catalog.list_folders().await?;
    let files = state.catalog.list_files().await?;
    Ok(Json(UploadPage { folders, files }))
}

/// POST /upload (multipart)
/// Fields: `file` (required), `folderId` (optional, empty means unfiled)
#[instrument(skip(state, user, multipart), fields(user_id = user.id))]
pub async fn upload_file(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    WithRejection(multipart, _): WithRejection<Multipart, AppError>,
) -> AppResult<Redirect> {
    upload::accept_upload(&state, &user, multipart).await?;
    Ok(Redirect::to("/upload"))
}

#[instrument(skip(state))]
pub async fn get_file(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> AppResult<Json<FileDetails>> {
    let file = state
        .catalog
        .find_file(id)
        .await?
        .ok_or_else(|| AppError::not_found("File"))?;
    Ok(Json(FileDetails { file }))
}
