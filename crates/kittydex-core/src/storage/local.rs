//! Local filesystem backend.
//!
//! Each key maps 1:1 to a file in the output directory. Writes go through a
//! temp file and a rename so that a crash mid-write never leaves a truncated
//! `{id}.json` marker behind.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::{Storage, validate_key};
use crate::{Result, StorageError};

/// Storage rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Create storage rooted at `root`. The directory is created on first write.
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

fn io_error(key: &str, err: &std::io::Error) -> StorageError {
    let transient = matches!(
        err.kind(),
        ErrorKind::TimedOut | ErrorKind::Interrupted | ErrorKind::WouldBlock
    );
    if transient {
        StorageError::transient(key, err.to_string())
    } else {
        StorageError::permanent(key, err.to_string())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(key, &e).into()),
        }
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| io_error(key, &e))?;

        // Atomic write: temp file + rename
        let tmp_path = self.root.join(format!(".{key}.tmp"));
        fs::write(&tmp_path, bytes)
            .await
            .map_err(|e| io_error(key, &e))?;

        // Handle Windows: remove target before rename
        #[cfg(target_os = "windows")]
        if fs::metadata(&path).await.is_ok() {
            fs::remove_file(&path)
                .await
                .map_err(|e| io_error(key, &e))?;
        }

        fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| io_error(key, &e))?;

        debug!(key, bytes = bytes.len(), "saved file");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        fs::read(&path).await.map_err(|e| io_error(key, &e).into())
    }

    fn describe(&self) -> String {
        format!("local directory {}", self.root.display())
    }
}
