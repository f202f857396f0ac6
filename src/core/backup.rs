//! Backup storage for previous file contents.
//!
//! One plain-text file per operation: `<backups_dir>/<operation_id>.bak`.

use crate::models::transaction::{FileOperation, Transaction};
use crate::utils::{fs as fs_utils, hash};
use crate::Result;
use std::path::{Path, PathBuf};
use tokio::fs;

/// State of the backup an operation needs for its rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupState {
    /// The operation can be reverted without a backup.
    NotRequired,
    /// Backup present and, if checked, matching the recorded checksum.
    Present,
    /// Backup file is gone.
    Missing,
    /// Backup content does not match the recorded checksum.
    Corrupt,
}

/// Backup file store.
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    /// Create a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the backup file for an operation.
    pub fn path_for(&self, operation_id: &str) -> PathBuf {
        self.dir.join(format!("{}.bak", operation_id))
    }

    /// Store the previous content of an operation, byte for byte.
    pub async fn write(&self, operation_id: &str, content: impl AsRef<[u8]>) -> Result<()> {
        let path = self.path_for(operation_id);
        fs_utils::write_atomic(&path, content.as_ref())
            .await
            .map_err(|e| crate::Error::BackupFailed {
                id: operation_id.to_string(),
                reason: e.to_string(),
            })?;
        tracing::debug!("Backup written: {:?}", path);
        Ok(())
    }

    /// Read a backup, `None` when it does not exist.
    pub async fn read(&self, operation_id: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(operation_id)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, operation_id: &str) -> bool {
        fs_utils::path_exists(&self.path_for(operation_id)).await
    }

    /// Delete a backup, returning false when it was already gone.
    pub async fn remove(&self, operation_id: &str) -> Result<bool> {
        fs_utils::remove_if_exists(&self.path_for(operation_id)).await
    }

    /// Delete every backup written for a transaction.
    ///
    /// Best effort: failures are logged and the count of removed files returned.
    pub async fn remove_for(&self, transaction: &Transaction) -> usize {
        let mut removed = 0;
        for op in transaction.operations.iter().filter(|op| op.requires_backup()) {
            match self.remove(&op.id).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!("Failed to remove backup {}: {}", op.id, e),
            }
        }
        removed
    }

    /// Check the backup an operation depends on.
    pub async fn inspect(&self, op: &FileOperation, verify_checksum: bool) -> BackupState {
        if !op.requires_backup() {
            return BackupState::NotRequired;
        }

        if !verify_checksum || op.checksum.is_none() {
            return if self.exists(&op.id).await {
                BackupState::Present
            } else {
                BackupState::Missing
            };
        }

        match self.read(&op.id).await {
            Ok(Some(content)) => {
                if op.checksum.as_deref() == Some(hash::sha256_bytes(&content).as_str()) {
                    BackupState::Present
                } else {
                    BackupState::Corrupt
                }
            }
            Ok(None) => BackupState::Missing,
            Err(e) => {
                tracing::warn!("Backup for {} unreadable: {}", op.id, e);
                BackupState::Corrupt
            }
        }
    }
}
