//! Multipart upload: stage the bytes, record the row, publish the blob.

use axum::extract::Multipart;
use rand::Rng;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::{
    auth::repo_types::User,
    catalog::{FileRecord, NewFile},
    error::{AppError, AppResult},
    folders::handlers::{ensure_owner, load_folder},
    state::AppState,
    storage::{StagedBlob, Storage},
};

const FILE_FIELD: &str = "file";
const FOLDER_FIELD: &str = "folderId";
const MAX_NAME_LEN: usize = 200;

/// `<unix millis>-<random below 1e9>-<sanitized original name>`.
pub fn stored_name(original: &str) -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("{millis}-{suffix}-{}", sanitize_filename(original))
}

/// Keep the last path component and only `[A-Za-z0-9._-]`.
pub fn sanitize_filename(original: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_LEN)
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// Empty means unfiled.
pub fn parse_folder_id(raw: &str) -> AppResult<Option<i64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<i64>()
        .map(Some)
        .map_err(|_| AppError::validation("folderId must be a number"))
}

struct Incoming {
    original_name: String,
    blob: StagedBlob,
}

/// Read the multipart body, leaving the file staged on disk. The staged blob
/// is discarded on every error path.
async fn read_form(
    storage: &Storage,
    multipart: &mut Multipart,
) -> AppResult<(Option<Incoming>, Option<i64>)> {
    let mut incoming: Option<Incoming> = None;
    let mut folder_id = None;

    let result = async {
        while let Some(mut field) = multipart.next_field().await? {
            let name = field.name().map(|s| s.to_string());
            match name.as_deref() {
                Some(FILE_FIELD) if incoming.is_none() => {
                    let original_name = field.file_name().unwrap_or("file").to_string();
                    let blob = storage.stage(&stored_name(&original_name)).await?;
                    let upload = incoming.insert(Incoming { original_name, blob });
                    while let Some(chunk) = field.chunk().await? {
                        upload.blob.write(&chunk).await?;
                    }
                }
                Some(FOLDER_FIELD) => {
                    folder_id = parse_folder_id(&field.text().await?)?;
                }
                _ => {}
            }
        }
        Ok::<(), AppError>(())
    }
    .await;

    if let Err(e) = result {
        if let Some(upload) = incoming {
            storage.discard(upload.blob).await;
        }
        return Err(e);
    }
    Ok((incoming, folder_id))
}

/// Accept one upload for `user`.
///
/// The row is inserted before the blob is published; if publishing fails the
/// row is deleted again, and if the insert fails the staged blob is removed.
pub async fn accept_upload(
    state: &AppState,
    user: &User,
    mut multipart: Multipart,
) -> AppResult<FileRecord> {
    let storage = state.storage.as_ref();
    let (incoming, folder_id) = read_form(storage, &mut multipart).await?;
    let Some(Incoming { original_name, blob }) = incoming else {
        return Err(AppError::validation("file is required"));
    };

    if let Some(id) = folder_id {
        let checked = match load_folder(state, id).await {
            Ok(folder) => ensure_owner(&folder, user.id),
            Err(e) => Err(e),
        };
        if let Err(e) = checked {
            storage.discard(blob).await;
            return Err(e);
        }
    }

    let new = NewFile {
        name: original_name,
        size: i64::try_from(blob.size()).unwrap_or(i64::MAX),
        folder_id,
        url: Storage::url_for(blob.name()),
    };

    let record = match state.catalog.create_file(&new).await {
        Ok(record) => record,
        Err(e) => {
            warn!(error = %e, name = %new.name, "catalog insert failed, discarding staged upload");
            storage.discard(blob).await;
            return Err(e);
        }
    };

    // A failed publish has already removed the staged file; only the row is left.
    if let Err(e) = storage.publish(blob).await {
        error!(error = ?e, file_id = record.id, "publish failed, removing catalog row");
        if let Err(undo) = state.catalog.delete_file(record.id).await {
            error!(error = %undo, file_id = record.id, "failed to remove row of unpublished upload");
        }
        return Err(e.into());
    }

    info!(
        file_id = record.id,
        size = record.size,
        folder_id = ?record.folder_id,
        user_id = user.id,
        "file uploaded"
    );
    Ok(record)
}
