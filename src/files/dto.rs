use serde::{Deserialize, Serialize};

use crate::catalog::{FileRecord, Folder};

/// Everything the upload page shows.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadPage {
    pub folders: Vec<Folder>,
    pub files: Vec<FileRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileDetails {
    pub file: FileRecord,
}
