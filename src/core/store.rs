//! Persistence of transactions and checkpoints.
//!
//! Layout under the state directory:
//! - `transactions/<id>.json`
//! - `backups/<operation_id>.bak`
//! - `checkpoints/<id>.json`

use crate::models::checkpoint::Checkpoint;
use crate::models::transaction::Transaction;
use crate::utils::fs as fs_utils;
use crate::Result;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::fs;

/// On-disk state of one project.
#[derive(Debug, Clone)]
pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    /// Create a store for the given state directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn transactions_dir(&self) -> PathBuf {
        self.root.join("transactions")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.root.join("backups")
    }

    pub fn checkpoints_dir(&self) -> PathBuf {
        self.root.join("checkpoints")
    }

    pub fn transaction_path(&self, id: &str) -> PathBuf {
        self.transactions_dir().join(format!("{}.json", id))
    }

    pub fn checkpoint_path(&self, id: &str) -> PathBuf {
        self.checkpoints_dir().join(format!("{}.json", id))
    }

    /// Create the state directories.
    pub async fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            self.transactions_dir(),
            self.backups_dir(),
            self.checkpoints_dir(),
        ] {
            fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }

    /// Write a transaction to its own file.
    pub async fn save_transaction(&self, transaction: &Transaction) -> Result<()> {
        let json = serde_json::to_string_pretty(transaction)
            .map_err(|e| crate::Error::transaction_persistence(&transaction.id, e))?;
        fs_utils::write_atomic(&self.transaction_path(&transaction.id), json.as_bytes())
            .await
            .map_err(|e| crate::Error::transaction_persistence(&transaction.id, e))?;

        tracing::debug!("Transaction saved: {}", transaction.id);
        Ok(())
    }

    pub async fn delete_transaction(&self, id: &str) -> Result<bool> {
        fs_utils::remove_if_exists(&self.transaction_path(id)).await
    }

    /// Load every transaction file, skipping malformed ones.
    pub async fn load_transactions(&self) -> Result<Vec<Transaction>> {
        load_dir(&self.transactions_dir()).await
    }

    /// Write a checkpoint to its own file.
    pub async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        let json = serde_json::to_string_pretty(checkpoint)
            .map_err(|e| crate::Error::checkpoint_persistence(&checkpoint.id, e))?;
        fs_utils::write_atomic(&self.checkpoint_path(&checkpoint.id), json.as_bytes())
            .await
            .map_err(|e| crate::Error::checkpoint_persistence(&checkpoint.id, e))?;

        tracing::debug!("Checkpoint saved: {}", checkpoint.id);
        Ok(())
    }

    pub async fn delete_checkpoint(&self, id: &str) -> Result<bool> {
        fs_utils::remove_if_exists(&self.checkpoint_path(id)).await
    }

    /// Load every checkpoint file, skipping malformed ones.
    pub async fn load_checkpoints(&self) -> Result<Vec<Checkpoint>> {
        load_dir(&self.checkpoints_dir()).await
    }
}

/// Deserialize every `*.json` file in a directory.
async fn load_dir<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut items = Vec::new();

    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(items),
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Skipping unreadable file {:?}: {}", path, e);
                continue;
            }
        };

        match serde_json::from_str(&content) {
            Ok(item) => items.push(item),
            Err(e) => tracing::warn!("Skipping malformed file {:?}: {}", path, e),
        }
    }

    Ok(items)
}
