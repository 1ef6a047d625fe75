use axum::{
    extract::{Path, State},
    response::Redirect,
    routing::{get, post},
    Form, Json, Router,
};
use axum_extra::extract::WithRejection;
use tracing::{info, instrument, warn};

use super::dto::{CreateFolderForm, FolderDetails, FolderList};
use crate::{
    auth::AuthUser,
    catalog::Folder,
    error::{AppError, AppResult},
    state::AppState,
    storage::Storage,
};

pub fn folder_routes() -> Router<AppState> {
    Router::new()
        .route("/folders", get(list_folders).post(create_folder))
        .route("/folders/:id", get(get_folder))
        .route("/folders/:id/delete", post(delete_folder))
}

#[instrument(skip(state))]
pub async fn list_folders(State(state): State<AppState>) -> AppResult<Json<FolderList>> {
    let folders = state.catalog.list_folders().await?;
    Ok(Json(FolderList { folders }))
}

#[instrument(skip(state, user, form), fields(user_id = user.id))]
pub async fn create_folder(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    WithRejection(Form(form), _): WithRejection<Form<CreateFolderForm>, AppError>,
) -> AppResult<Redirect> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Folder name is required."));
    }
    let folder = state.catalog.create_folder(name, user.id).await?;
    info!(folder_id = folder.id, "folder created");
    Ok(Redirect::to("/upload"))
}

#[instrument(skip(state))]
pub async fn get_folder(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> AppResult<Json<FolderDetails>> {
    let folder = load_folder(&state, id).await?;
    let files = state.catalog.list_files_in_folder(id).await?;
    Ok(Json(FolderDetails { folder, files }))
}

/// Deleting a folder takes its files with it: rows in the same transaction,
/// blobs afterwards on a best-effort basis.
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn delete_folder(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> AppResult<Redirect> {
    let folder = load_folder(&state, id).await?;
    ensure_owner(&folder, user.id)?;

    let removed = state.catalog.delete_folder(id).await?;
    for file in &removed {
        let Some(name) = Storage::name_from_url(&file.url) else {
            warn!(file_id = file.id, url = %file.url, "file url outside upload dir");
            continue;
        };
        if let Err(e) = state.storage.delete(name).await {
            warn!(error = %e, file_id = file.id, "failed to remove blob of deleted folder");
        }
    }

    info!(folder_id = id, files = removed.len(), "folder deleted");
    Ok(Redirect::to("/folders"))
}

pub(crate) async fn load_folder(state: &AppState, id: i64) -> AppResult<Folder> {
    state
        .catalog
        .find_folder(id)
        .await?
        .ok_or_else(|| AppError::not_found("Folder"))
}

pub(crate) fn ensure_owner(folder: &Folder, user_id: i64) -> AppResult<()> {
    if folder.user_id != user_id {
        warn!(folder_id = folder.id, user_id, "folder owned by someone else");
        return Err(AppError::Forbidden("You do not own this folder".into()));
    }
    Ok(())
}
