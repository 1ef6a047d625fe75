use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use super::{Catalog, FileRecord, Folder, NewFile};
use crate::error::{AppError, AppResult};

const FOLDER_COLUMNS: &str = "id, name, user_id, created_at";
const FILE_COLUMNS: &str = "id, name, size, folder_id, url, created_at";

#[derive(Clone)]
pub struct PgCatalog {
    db: PgPool,
}

impl PgCatalog {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Postgres reports a missing referenced row as SQLSTATE 23503.
fn is_fk_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23503"),
        _ => false,
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn list_folders(&self) -> AppResult<Vec<Folder>> {
        let rows = sqlx::query_as::<_, Folder>(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders ORDER BY id"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn list_folders_by_owner(&self, user_id: i64) -> AppResult<Vec<Folder>> {
        let rows = sqlx::query_as::<_, Folder>(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE user_id = $1 ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn create_folder(&self, name: &str, user_id: i64) -> AppResult<Folder> {
        let folder = sqlx::query_as::<_, Folder>(&format!(
            "INSERT INTO folders (name, user_id) VALUES ($1, $2) RETURNING {FOLDER_COLUMNS}"
        ))
        .bind(name)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;
        Ok(folder)
    }

    async fn find_folder(&self, id: i64) -> AppResult<Option<Folder>> {
        let folder = sqlx::query_as::<_, Folder>(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(folder)
    }

    async fn delete_folder(&self, id: i64) -> AppResult<Vec<FileRecord>> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let removed = sqlx::query_as::<_, FileRecord>(&format!(
            "DELETE FROM files WHERE folder_id = $1 RETURNING {FILE_COLUMNS}"
        ))
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let res = sqlx::query("DELETE FROM folders WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if res.rows_affected() == 0 {
            return Err(AppError::not_found("Folder"));
        }

        tx.commit().await.context("commit tx")?;
        Ok(removed)
    }

    async fn list_files(&self) -> AppResult<Vec<FileRecord>> {
        let rows = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files ORDER BY id"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn list_files_in_folder(&self, folder_id: i64) -> AppResult<Vec<FileRecord>> {
        let rows = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE folder_id = $1 ORDER BY id"
        ))
        .bind(folder_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find_file(&self, id: i64) -> AppResult<Option<FileRecord>> {
        let file = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(file)
    }

    async fn create_file(&self, new: &NewFile) -> AppResult<FileRecord> {
        let res = sqlx::query_as::<_, FileRecord>(&format!(
            r#"
            INSERT INTO files (name, size, folder_id, url)
            VALUES ($1, $2, $3, $4)
            RETURNING {FILE_COLUMNS}
            "#
        ))
        .bind(&new.name)
        .bind(new.size)
        .bind(new.folder_id) // Option<i64> → NULL allowed
        .bind(&new.url)
        .fetch_one(&self.db)
        .await;

        match res {
            Ok(file) => Ok(file),
            Err(e) if is_fk_violation(&e) => Err(AppError::not_found("Folder")),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_file(&self, id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
