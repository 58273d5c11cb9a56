// src/storage/mod.rs

//! Byte-stream storage for large assets (videos, archives).
//!
//! Fetches always land at the caller's declared path via a temp file and a
//! rename, so a half-downloaded asset is never visible under its final name.

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::errors::{BatchdagError, Result};
use crate::exec::BoxFuture;

pub mod memory;

pub use memory::MemoryStorage;

/// Abstract storage interface.
pub trait Storage: Send + Sync + Debug {
    /// Copy the object at `remote` to `dest`. Returns the number of bytes.
    fn fetch<'a>(&'a self, remote: &'a str, dest: &'a Path) -> BoxFuture<'a, Result<u64>>;

    /// Upload the local file at `local` to `remote`. Returns the number of bytes.
    fn put<'a>(&'a self, local: &'a Path, remote: &'a str) -> BoxFuture<'a, Result<u64>>;
}

/// Storage backed by a shared directory, plus HTTP(S) downloads.
///
/// - `http://` / `https://` sources are streamed with `reqwest`.
/// - Any other remote path is relative to `share_root`.
#[derive(Debug, Clone)]
pub struct SharedStorage {
    share_root: PathBuf,
    client: reqwest::Client,
}

impl SharedStorage {
    pub fn new(share_root: impl Into<PathBuf>) -> Self {
        Self {
            share_root: share_root.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn share_root(&self) -> &Path {
        &self.share_root
    }

    async fn fetch_http(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("requesting {url}"))?;

        let temp = temp_path_for(dest)?;
        let mut file = tokio::fs::File::create(&temp).await?;
        let mut written = 0u64;

        while let Some(chunk) = response
            .chunk()
            .await
            .with_context(|| format!("reading body of {url}"))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        persist(temp, dest)?;
        info!(url = %url, dest = ?dest, bytes = written, "downloaded");
        Ok(written)
    }

    async fn fetch_shared(&self, remote: &str, dest: &Path) -> Result<u64> {
        let src = self.share_root.join(remote);
        let temp = temp_path_for(dest)?;
        let bytes = tokio::fs::copy(&src, &temp)
            .await
            .with_context(|| format!("copying {:?} from shared storage", src))?;
        persist(temp, dest)?;
        debug!(src = ?src, dest = ?dest, bytes, "fetched from shared storage");
        Ok(bytes)
    }

    async fn put_shared(&self, local: &Path, remote: &str) -> Result<u64> {
        let dest = self.share_root.join(remote);
        let temp = temp_path_for(&dest)?;
        let bytes = tokio::fs::copy(local, &temp)
            .await
            .with_context(|| format!("uploading {:?} to shared storage", local))?;
        persist(temp, &dest)?;
        debug!(local = ?local, dest = ?dest, bytes, "uploaded to shared storage");
        Ok(bytes)
    }
}

impl Storage for SharedStorage {
    fn fetch<'a>(&'a self, remote: &'a str, dest: &'a Path) -> BoxFuture<'a, Result<u64>> {
        Box::pin(async move {
            if is_http(remote) {
                self.fetch_http(remote, dest).await
            } else {
                self.fetch_shared(remote, dest).await
            }
        })
    }

    fn put<'a>(&'a self, local: &'a Path, remote: &'a str) -> BoxFuture<'a, Result<u64>> {
        Box::pin(self.put_shared(local, remote))
    }
}

pub(crate) fn is_http(remote: &str) -> bool {
    remote.starts_with("http://") || remote.starts_with("https://")
}

/// Hidden temp file next to `dest`; removed on drop unless persisted.
pub(crate) fn temp_path_for(dest: &Path) -> Result<TempPath> {
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let file = tempfile::Builder::new()
        .prefix(".batchdag-")
        .suffix(".partial")
        .tempfile_in(dir)?;
    Ok(file.into_temp_path())
}

pub(crate) fn persist(temp: TempPath, dest: &Path) -> Result<()> {
    temp.persist(dest)
        .map_err(|e| BatchdagError::IoError(e.error))
}
