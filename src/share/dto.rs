use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::catalog::{FileRecord, Folder};

#[derive(Debug, Deserialize, Serialize)]
pub struct ShareForm {
    /// Days until the link expires. Kept as text so a bad value becomes our
    /// own validation error rather than a form rejection.
    #[serde(default)]
    pub duration: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharePage {
    pub folder_id: i64,
    pub folder_name: String,
    pub share_link: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedFolder {
    pub folder: Folder,
    pub files: Vec<FileRecord>,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}
