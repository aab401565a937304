use std::{fs, path::PathBuf};

use {async_trait::async_trait, voltaic_common::types::MediaRef};

use crate::error::{Error, Result};

/// Durable blob storage, accessed only by key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
}

/// Fetches inbound media bytes from a channel-provided reference.
///
/// Channel providers expose short-lived download URLs; the concrete
/// implementation lives with each channel adapter. Tests use a stub.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, media: &MediaRef) -> anyhow::Result<Vec<u8>>;
}

/// Filesystem blob store.
pub struct FsBlobStore {
    pub base_dir: PathBuf,
}

impl FsBlobStore {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        // Keys are generated internally, but reject traversal anyway.
        if key.contains("..") || key.starts_with('/') {
            return Err(Error::message(format!("invalid blob key: {key}")));
        }
        Ok(self.base_dir.join(key))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        let bytes = bytes.to_vec();

        tokio::task::spawn_blocking(move || -> Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, &bytes)?;
            Ok(())
        })
        .await??;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;

        tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let data = fs::read(&path)?;
            Ok(data)
        })
        .await?
    }
}

/// Build a storage key for an inbound attachment: a fresh UUID directory
/// plus a sanitized filename.
#[must_use]
pub fn storage_key_for(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let safe = if safe.is_empty() {
        "attachment.bin".to_string()
    } else {
        safe
    };
    format!("{}/{safe}", uuid::Uuid::new_v4())
}
