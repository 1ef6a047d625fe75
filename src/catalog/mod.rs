//! Folder and file metadata.

pub mod repo;
pub mod repo_types;

use async_trait::async_trait;

pub use repo::PgCatalog;
pub use repo_types::{FileRecord, Folder, NewFile};

use crate::error::AppResult;

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn list_folders(&self) -> AppResult<Vec<Folder>>;
    async fn list_folders_by_owner(&self, user_id: i64) -> AppResult<Vec<Folder>>;
    async fn create_folder(&self, name: &str, user_id: i64) -> AppResult<Folder>;
    async fn find_folder(&self, id: i64) -> AppResult<Option<Folder>>;
    /// Delete a folder together with its files, returning the file rows that
    /// went with it so their blobs can be removed.
    async fn delete_folder(&self, id: i64) -> AppResult<Vec<FileRecord>>;

    async fn list_files(&self) -> AppResult<Vec<FileRecord>>;
    async fn list_files_in_folder(&self, folder_id: i64) -> AppResult<Vec<FileRecord>>;
    async fn find_file(&self, id: i64) -> AppResult<Option<FileRecord>>;
    /// A `folder_id` that no longer exists is `AppError::NotFound`.
    async fn create_file(&self, new: &NewFile) -> AppResult<FileRecord>;
    async fn delete_file(&self, id: i64) -> AppResult<()>;
}
