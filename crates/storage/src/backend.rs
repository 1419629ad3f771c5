// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Durable backing stores for history snapshots.
//!
//! The store persists whole snapshots through a [`SnapshotBackend`]. Writers
//! are serialized by the store itself; a backend only has to make a single
//! write atomic.

use crate::error::Result;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Storage for the serialized history snapshot.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotBackend: Send + Sync {
    /// Read the last written snapshot, or `None` if nothing was ever written.
    async fn read(&self) -> Result<Option<Vec<u8>>>;

    /// Replace the stored snapshot. Must be all-or-nothing.
    async fn write(&self, bytes: &[u8]) -> Result<()>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Snapshot kept in a single JSON file.
///
/// Writes go to a sibling `.tmp` file which is synced and then renamed over
/// the target, so a crash leaves either the old or the new snapshot.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Create a backend for `path`. Nothing is touched until the first I/O.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Snapshot file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = OsString::from(self.path.as_os_str());
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

#[async_trait]
impl SnapshotBackend for FileBackend {
    async fn read(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.temp_path();
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-process backend, for tests and ephemeral services.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: Mutex<Option<Vec<u8>>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend pre-loaded with `bytes`.
    pub fn with_contents(bytes: Vec<u8>) -> Self {
        Self {
            data: Mutex::new(Some(bytes)),
        }
    }

    /// Current contents.
    pub async fn contents(&self) -> Option<Vec<u8>> {
        self.data.lock().await.clone()
    }
}

#[async_trait]
impl SnapshotBackend for MemoryBackend {
    async fn read(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.data.lock().await.clone())
    }

    async fn write(&self, bytes: &[u8]) -> Result<()> {
        *self.data.lock().await = Some(bytes.to_vec());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
