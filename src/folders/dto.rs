use serde::{Deserialize, Serialize};

use crate::catalog::{FileRecord, Folder};

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateFolderForm {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FolderList {
    pub folders: Vec<Folder>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FolderDetails {
    pub folder: Folder,
    pub files: Vec<FileRecord>,
}
