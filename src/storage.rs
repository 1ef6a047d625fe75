//! Local-disk blob storage with a two-phase write.
//!
//! Bytes are first written under a staging directory that sits next to the
//! public upload directory (so half-written blobs are never served), then
//! published into the upload directory with a rename. Both directories live
//! on the same filesystem, which keeps the rename atomic.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use anyhow::Context;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, warn};

/// URL prefix under which published blobs are served.
pub const PUBLIC_PREFIX: &str = "/uploads";

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
    staging: PathBuf,
}

/// A blob being written. Hand it back to [`Storage::publish`] or
/// [`Storage::discard`].
#[derive(Debug)]
pub struct StagedBlob {
    file: fs::File,
    path: PathBuf,
    name: String,
    size: u64,
}

impl StagedBlob {
    pub async fn write(&mut self, chunk: &[u8]) -> anyhow::Result<()> {
        self.file
            .write_all(chunk)
            .await
            .with_context(|| format!("write staged blob {}", self.name))?;
        self.size += chunk.len() as u64;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Storage {
    pub async fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        // Normalize so "uploads/" and "uploads" give the same sibling.
        let root: PathBuf = root.into().components().collect();
        let mut staging: OsString = root.as_os_str().to_owned();
        staging.push(".staging");
        let staging = PathBuf::from(staging);

        fs::create_dir_all(&root)
            .await
            .with_context(|| format!("create upload dir {}", root.display()))?;
        fs::create_dir_all(&staging)
            .await
            .with_context(|| format!("create staging dir {}", staging.display()))?;

        Ok(Self { root, staging })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn url_for(name: &str) -> String {
        format!("{PUBLIC_PREFIX}/{name}")
    }

    /// Inverse of [`Storage::url_for`]; `None` for anything we did not mint.
    pub fn name_from_url(url: &str) -> Option<&str> {
        url.strip_prefix(PUBLIC_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|name| is_plain_name(name))
    }

    pub async fn stage(&self, name: &str) -> anyhow::Result<StagedBlob> {
        anyhow::ensure!(is_plain_name(name), "invalid blob name {name:?}");
        let path = self.staging.join(name);
        let file = fs::File::create(&path)
            .await
            .with_context(|| format!("create staged blob {}", path.display()))?;
        Ok(StagedBlob {
            file,
            path,
            name: name.to_string(),
            size: 0,
        })
    }

    /// Flush the staged blob and move it into the public directory. On failure
    /// the staged file is removed before the error is returned.
    pub async fn publish(&self, staged: StagedBlob) -> anyhow::Result<()> {
        let StagedBlob {
            mut file,
            path,
            name,
            size,
        } = staged;
        let target = self.root.join(&name);

        let moved = async {
            file.flush().await.context("flush staged blob")?;
            file.sync_all().await.context("sync staged blob")?;
            drop(file);
            fs::rename(&path, &target)
                .await
                .with_context(|| format!("publish {name}"))?;
            Ok::<(), anyhow::Error>(())
        }
        .await;

        if let Err(e) = moved {
            if let Err(rm) = fs::remove_file(&path).await {
                warn!(error = %rm, %name, "failed to remove staged blob after failed publish");
            }
            return Err(e);
        }
        debug!(%name, size, "blob published");
        Ok(())
    }

    /// Remove a staged blob. Failures are logged, never returned, since this
    /// only runs on paths that are already failing.
    pub async fn discard(&self, staged: StagedBlob) {
        let StagedBlob { file, path, name, .. } = staged;
        drop(file);
        if let Err(e) = fs::remove_file(&path).await {
            warn!(error = %e, %name, "failed to discard staged blob");
        }
    }

    /// Delete a published blob. A blob that is already gone is not an error.
    pub async fn delete(&self, name: &str) -> anyhow::Result<()> {
        anyhow::ensure!(is_plain_name(name), "invalid blob name {name:?}");
        match fs::remove_file(self.root.join(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("delete blob {name}")),
        }
    }

    #[cfg(test)]
    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
}
