// src/storage/memory.rs

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use tokio::io::AsyncWriteExt;

use super::{Storage, persist, temp_path_for};
use crate::errors::Result;
use crate::exec::BoxFuture;

/// In-memory object store keyed by remote path.
///
/// Fetches still write real files (atomically) at the destination so that
/// the code under test sees the same filesystem effects as in production.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(&self, remote: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.objects
            .lock()
            .unwrap()
            .insert(remote.into(), content.into());
    }

    pub fn object(&self, remote: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(remote).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Storage for MemoryStorage {
    fn fetch<'a>(&'a self, remote: &'a str, dest: &'a Path) -> BoxFuture<'a, Result<u64>> {
        Box::pin(async move {
            let content = self
                .object(remote)
                .ok_or_else(|| anyhow!("object not found: {remote}"))?;

            let temp = temp_path_for(dest)?;
            let mut file = tokio::fs::File::create(&temp).await?;
            file.write_all(&content).await?;
            file.flush().await?;
            drop(file);
            persist(temp, dest)?;

            Ok(content.len() as u64)
        })
    }

    fn put<'a>(&'a self, local: &'a Path, remote: &'a str) -> BoxFuture<'a, Result<u64>> {
        Box::pin(async move {
            let content = tokio::fs::read(local).await?;
            let len = content.len() as u64;
            self.add_object(remote, content);
            Ok(len)
        })
    }
}
