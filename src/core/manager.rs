//! Transaction manager.
//!
//! Records the file mutations of generator commands as transactions:
//! 1. `start_transaction` opens the single pending transaction
//! 2. `add_operation` snapshots and backs up each file before it changes
//! 3. `complete_transaction` persists it and applies the history cap

use crate::core::backup::BackupStore;
use crate::core::events::{EventBus, TransactionEvent};
use crate::core::store::StateStore;
use crate::models::checkpoint::Checkpoint;
use crate::models::config::UndoConfig;
use crate::models::rollback::SessionStatistics;
use crate::models::transaction::{
    FileOperation, FileOperationType, Metadata, OperationOptions, Transaction, TransactionStatus,
};
use crate::utils::{fs as fs_utils, hash};
use crate::Result;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::broadcast;

/// Undo manager for one project directory.
#[derive(Debug)]
pub struct UndoManager {
    project_root: PathBuf,
    config: UndoConfig,
    store: StateStore,
    backups: BackupStore,
    events: EventBus,
    /// The pending transaction, if any.
    current: Option<Transaction>,
    history: HashMap<String, Transaction>,
    pub(crate) checkpoints: HashMap<String, Checkpoint>,
    pub(crate) stats: SessionStatistics,
}

impl UndoManager {
    /// Create a manager for `project_root`. Call `initialize` before use.
    pub fn new(project_root: impl AsRef<Path>, config: UndoConfig) -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        let project_root = fs_utils::normalize_path(&cwd, project_root.as_ref());
        let store = StateStore::new(project_root.join(&config.state_dir));
        let backups = BackupStore::new(store.backups_dir());
        let events = EventBus::new(config.event_capacity);

        Self {
            project_root,
            config,
            store,
            backups,
            events,
            current: None,
            history: HashMap::new(),
            checkpoints: HashMap::new(),
            stats: SessionStatistics::new(),
        }
    }

    /// Create and initialize a manager.
    pub async fn open(project_root: impl AsRef<Path>, config: UndoConfig) -> Result<Self> {
        let mut manager = Self::new(project_root, config);
        manager.initialize().await?;
        Ok(manager)
    }

    /// Create the state directories and load persisted transactions and checkpoints.
    pub async fn initialize(&mut self) -> Result<()> {
        self.store.ensure_dirs().await?;

        self.history = self
            .store
            .load_transactions()
            .await?
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect();

        self.checkpoints = self
            .store
            .load_checkpoints()
            .await?
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();

        tracing::info!(
            "Loaded {} transactions and {} checkpoints from {:?}",
            self.history.len(),
            self.checkpoints.len(),
            self.store.root()
        );
        Ok(())
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn config(&self) -> &UndoConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &StateStore {
        &self.store
    }

    pub(crate) fn backups(&self) -> &BackupStore {
        &self.backups
    }

    pub(crate) fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribe to transaction and rollback events.
    pub fn subscribe(&self) -> broadcast::Receiver<TransactionEvent> {
        self.events.subscribe()
    }

    /// Open a new transaction.
    pub fn start_transaction(
        &mut self,
        name: &str,
        description: &str,
        command: &str,
        metadata: Option<Metadata>,
    ) -> Result<String> {
        if let Some(ref current) = self.current {
            return Err(crate::Error::Conflict(current.id.clone()));
        }

        let transaction = Transaction::new(name, description, command, metadata.unwrap_or_default());
        let id = transaction.id.clone();

        tracing::info!("Transaction started: {} ({})", name, id);
        self.events.publish(TransactionEvent::TransactionStarted {
            transaction_id: id.clone(),
            name: transaction.name.clone(),
            command: transaction.command.clone(),
        });

        self.current = Some(transaction);
        self.stats.transactions_started += 1;
        Ok(id)
    }

    /// Record a file mutation in the pending transaction.
    ///
    /// Call before mutating the file: when `previous_content` is not given,
    /// the current file content is captured as the state to restore.
    /// Symlinks are followed. Content that is not UTF-8 is recorded lossily
    /// in the transaction while the backup keeps the exact bytes.
    pub async fn add_operation(
        &mut self,
        op_type: FileOperationType,
        path: impl AsRef<Path>,
        options: OperationOptions,
    ) -> Result<String> {
        match self.current {
            Some(ref current) if current.status == TransactionStatus::Pending => {}
            Some(ref current) => {
                return Err(crate::Error::State(format!(
                    "transaction {} is {}",
                    current.id, current.status
                )))
            }
            None => return Err(crate::Error::State("call start_transaction first".to_string())),
        }

        let path = fs_utils::normalize_path(&self.project_root, path.as_ref());
        let previous_path = options
            .previous_path
            .map(|p| fs_utils::normalize_path(&self.project_root, &p));

        let previous_bytes = match options.previous_content {
            Some(content) => Some(content.into_bytes()),
            None => snapshot(&path).await?,
        };

        let mut metadata = options.metadata;
        let previous_content = previous_bytes.as_deref().map(|bytes| {
            String::from_utf8(bytes.to_vec()).unwrap_or_else(|_| {
                tracing::warn!("{:?} is not valid UTF-8, the backup keeps the exact bytes", path);
                metadata.insert(
                    "previous_content_lossy".to_string(),
                    serde_json::Value::Bool(true),
                );
                String::from_utf8_lossy(bytes).into_owned()
            })
        });

        let operation = FileOperation {
            id: uuid::Uuid::new_v4().to_string(),
            op_type,
            path,
            previous_path,
            checksum: previous_bytes.as_deref().map(hash::sha256_bytes),
            previous_content,
            current_content: options.current_content,
            previous_mode: options.previous_mode,
            timestamp: Utc::now(),
            metadata,
        };

        // The backup must exist before the operation is recorded.
        if operation.requires_backup() {
            if let Some(ref bytes) = previous_bytes {
                self.backups.write(&operation.id, bytes).await?;
            }
        }

        let transaction = self
            .current
            .as_mut()
            .ok_or_else(|| crate::Error::State("call start_transaction first".to_string()))?;

        tracing::debug!(
            "Operation recorded: {} {:?} ({})",
            operation.op_type,
            operation.path,
            operation.id
        );
        self.events.publish(TransactionEvent::OperationExecuted {
            transaction_id: transaction.id.clone(),
            operation_id: operation.id.clone(),
            op_type: operation.op_type,
            path: operation.path.clone(),
        });

        let id = operation.id.clone();
        transaction.operations.push(operation);
        self.stats.operations_recorded += 1;
        Ok(id)
    }

    /// Complete and persist the pending transaction.
    ///
    /// On a persistence error the transaction is marked failed and stays
    /// pending in the slot: retry `complete_transaction` or `abort_transaction`.
    pub async fn complete_transaction(&mut self) -> Result<String> {
        let transaction = self
            .current
            .as_mut()
            .ok_or_else(|| crate::Error::State("no transaction to complete".to_string()))?;

        transaction.status = TransactionStatus::Completed;
        let snapshot = transaction.clone();

        if let Err(e) = self.store.save_transaction(&snapshot).await {
            if let Some(ref mut current) = self.current {
                current.status = TransactionStatus::Failed;
            }
            tracing::error!("Transaction {} failed to persist: {}", snapshot.id, e);
            self.events.publish(TransactionEvent::TransactionFailed {
                transaction_id: snapshot.id.clone(),
                error: e.to_string(),
            });
            self.stats.transactions_failed += 1;
            return Err(e);
        }

        self.current = None;
        let id = snapshot.id.clone();
        let operation_count = snapshot.operations.len();
        self.history.insert(id.clone(), snapshot);
        self.stats.transactions_completed += 1;

        self.enforce_history_limit().await;

        tracing::info!("Transaction completed: {} ({} operations)", id, operation_count);
        self.events.publish(TransactionEvent::TransactionCompleted {
            transaction_id: id.clone(),
            operation_count,
        });
        Ok(id)
    }

    /// Abandon the pending transaction and delete the backups it wrote.
    ///
    /// Files already changed by the caller are left as they are. When the
    /// transaction file cannot be removed the transaction stays pending.
    pub async fn abort_transaction(&mut self) -> Result<Transaction> {
        let id = self
            .current
            .as_ref()
            .map(|t| t.id.clone())
            .ok_or_else(|| crate::Error::State("no transaction to abort".to_string()))?;

        self.store.delete_transaction(&id).await?;
        let transaction = self
            .current
            .take()
            .ok_or_else(|| crate::Error::State("no transaction to abort".to_string()))?;

        let removed = self.backups.remove_for(&transaction).await;
        tracing::info!(
            "Transaction aborted: {} ({} backups removed)",
            transaction.id,
            removed
        );
        Ok(transaction)
    }

    /// The pending transaction, if any.
    pub fn current_transaction(&self) -> Option<&Transaction> {
        self.current.as_ref()
    }

    /// Look up a stored transaction.
    pub fn transaction(&self, id: &str) -> Option<&Transaction> {
        self.history.get(id)
    }

    pub(crate) fn transaction_mut(&mut self, id: &str) -> Option<&mut Transaction> {
        self.history.get_mut(id)
    }

    /// Stored transactions, newest first.
    pub fn transaction_history(&self) -> Vec<&Transaction> {
        let mut transactions: Vec<&Transaction> = self.history.values().collect();
        transactions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        transactions
    }

    /// Counters for this manager instance.
    pub fn session_statistics(&self) -> SessionStatistics {
        SessionStatistics {
            history_size: self.history.len(),
            checkpoint_count: self.checkpoints.len(),
            transaction_in_progress: self.current.is_some(),
            ..self.stats.clone()
        }
    }

    /// Delete stored transactions older than `older_than_days`, or all of them.
    ///
    /// Returns the number of transactions removed. Transactions that cannot
    /// be removed are logged and kept.
    pub async fn clear_history(&mut self, older_than_days: Option<u32>) -> Result<usize> {
        let cutoff = older_than_days.map(|days| Utc::now() - Duration::days(i64::from(days)));

        let ids: Vec<String> = self
            .history
            .values()
            .filter(|t| cutoff.map(|c| t.timestamp < c).unwrap_or(true))
            .map(|t| t.id.clone())
            .collect();

        let mut removed = 0;
        for id in &ids {
            match self.purge_transaction(id).await {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to purge transaction {}: {}", id, e),
            }
        }

        tracing::info!("Cleared {} of {} transactions from history", removed, ids.len());
        Ok(removed)
    }

    /// Purge the oldest transactions beyond `max_transactions`.
    async fn enforce_history_limit(&mut self) {
        let max = self.config.max_transactions;
        if self.history.len() <= max {
            return;
        }

        let mut by_age: Vec<(chrono::DateTime<Utc>, String)> = self
            .history
            .values()
            .map(|t| (t.timestamp, t.id.clone()))
            .collect();
        by_age.sort();

        let excess = by_age.len() - max;
        for (_, id) in by_age.into_iter().take(excess) {
            if let Err(e) = self.purge_transaction(&id).await {
                tracing::warn!("Failed to purge transaction {}: {}", id, e);
            }
        }
    }

    /// Remove a transaction, its file and its backups.
    ///
    /// The transaction stays in history when its file cannot be deleted.
    async fn purge_transaction(&mut self, id: &str) -> Result<()> {
        if !self.history.contains_key(id) {
            return Ok(());
        }

        self.store.delete_transaction(id).await?;
        let Some(transaction) = self.history.remove(id) else {
            return Ok(());
        };

        let removed = self.backups.remove_for(&transaction).await;
        tracing::debug!("Purged transaction {} ({} backups)", id, removed);
        Ok(())
    }
}

/// Read the current content of a file, following symlinks. `None` when absent.
async fn snapshot(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(Some(fs::read(path).await?)),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn manager(dir: &Path) -> UndoManager {
        UndoManager::open(dir, UndoConfig::default()).await.unwrap()
    }

    #[tokio::test]
    async fn test_single_open_transaction() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut mgr = manager(dir.path()).await;

        mgr.start_transaction("t1", "", "cmd", None).unwrap();
        let err = mgr.start_transaction("t2", "", "cmd", None).unwrap_err();
        assert!(matches!(err, crate::Error::Conflict(_)));

        mgr.complete_transaction().await.unwrap();
        assert!(mgr.start_transaction("t3", "", "cmd", None).is_ok());
    }

    #[tokio::test]
    async fn test_add_without_start_is_state_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut mgr = manager(dir.path()).await;

        let err = mgr
            .add_operation(FileOperationType::Create, "a.txt", OperationOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::State(_)));
        assert!(matches!(
            mgr.complete_transaction().await,
            Err(crate::Error::State(_))
        ));
    }

    #[tokio::test]
    async fn test_update_snapshots_and_backs_up() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("y.txt"), "old").unwrap();
        let mut mgr = manager(dir.path()).await;

        mgr.start_transaction("t", "d", "cmd", None).unwrap();
        let op_id = mgr
            .add_operation(
                FileOperationType::Update,
                "y.txt",
                OperationOptions::new().with_current_content("new"),
            )
            .await
            .unwrap();

        let op = &mgr.current_transaction().unwrap().operations[0];
        assert_eq!(op.previous_content.as_deref(), Some("old"));
        assert_eq!(op.checksum.as_deref(), Some(hash::sha256_str("old").as_str()));
        assert!(op.path.is_absolute());
        assert_eq!(
            mgr.backups().read(&op_id).await.unwrap().as_deref(),
            Some(&b"old"[..])
        );
    }

    #[tokio::test]
    async fn test_non_utf8_content_is_backed_up_exactly() {
        let dir = tempfile::TempDir::new().unwrap();
        let bytes = [0x89, 0x50, 0xff, 0xfe];
        std::fs::write(dir.path().join("logo.png"), bytes).unwrap();
        let mut mgr = manager(dir.path()).await;

        mgr.start_transaction("t", "d", "cmd", None).unwrap();
        let op_id = mgr
            .add_operation(FileOperationType::Update, "logo.png", OperationOptions::new())
            .await
            .unwrap();

        let op = &mgr.current_transaction().unwrap().operations[0];
        assert_eq!(op.checksum.as_deref(), Some(hash::sha256_bytes(&bytes).as_str()));
        assert_eq!(op.metadata["previous_content_lossy"], serde_json::Value::Bool(true));
        assert_eq!(
            mgr.backups().read(&op_id).await.unwrap().as_deref(),
            Some(&bytes[..])
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_file_is_snapshotted() {
        let dir = tempfile::TempDir::new().unwrap();
        let real = dir.path().join("real.txt");
        std::fs::write(&real, "old").unwrap();
        std::os::unix::fs::symlink(&real, dir.path().join("link.txt")).unwrap();
        let mut mgr = manager(dir.path()).await;

        mgr.start_transaction("t", "d", "cmd", None).unwrap();
        let op_id = mgr
            .add_operation(FileOperationType::Update, "link.txt", OperationOptions::new())
            .await
            .unwrap();

        let op = &mgr.current_transaction().unwrap().operations[0];
        assert_eq!(op.previous_content.as_deref(), Some("old"));
        assert!(mgr.backups().exists(&op_id).await);
    }

    #[tokio::test]
    async fn test_create_has_no_backup() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut mgr = manager(dir.path()).await;

        mgr.start_transaction("t", "d", "cmd", None).unwrap();
        let op_id = mgr
            .add_operation(FileOperationType::Create, "new.txt", OperationOptions::new())
            .await
            .unwrap();

        let op = &mgr.current_transaction().unwrap().operations[0];
        assert!(op.previous_content.is_none());
        assert!(op.checksum.is_none());
        assert!(!mgr.backups().exists(&op_id).await);
    }

    #[tokio::test]
    async fn test_abort_removes_backups() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "keep me").unwrap();
        let mut mgr = manager(dir.path()).await;

        mgr.start_transaction("t", "d", "cmd", None).unwrap();
        let op_id = mgr
            .add_operation(FileOperationType::Delete, "a.txt", OperationOptions::new())
            .await
            .unwrap();
        assert!(mgr.backups().exists(&op_id).await);

        let aborted = mgr.abort_transaction().await.unwrap();
        assert_eq!(aborted.operations.len(), 1);
        assert!(!mgr.backups().exists(&op_id).await);
        assert!(mgr.current_transaction().is_none());
        assert!(mgr.transaction_history().is_empty());
    }

    #[tokio::test]
    async fn test_failed_abort_keeps_transaction() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "keep me").unwrap();
        let mut mgr = manager(dir.path()).await;
        let transactions_dir = mgr.store().transactions_dir();

        let id = mgr.start_transaction("t", "d", "cmd", None).unwrap();
        let op_id = mgr
            .add_operation(FileOperationType::Delete, "a.txt", OperationOptions::new())
            .await
            .unwrap();

        std::fs::remove_dir_all(&transactions_dir).unwrap();
        std::fs::write(&transactions_dir, "not a directory").unwrap();

        assert!(mgr.abort_transaction().await.is_err());
        assert_eq!(mgr.current_transaction().unwrap().id, id);
        assert!(mgr.backups().exists(&op_id).await);

        std::fs::remove_file(&transactions_dir).unwrap();
        assert_eq!(mgr.abort_transaction().await.unwrap().id, id);
        assert!(mgr.current_transaction().is_none());
    }

    #[tokio::test]
    async fn test_statistics() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut mgr = manager(dir.path()).await;

        mgr.start_transaction("t", "d", "cmd", None).unwrap();
        mgr.add_operation(FileOperationType::Create, "a.txt", OperationOptions::new())
            .await
            .unwrap();
        let stats = mgr.session_statistics();
        assert!(stats.transaction_in_progress);
        assert_eq!(stats.operations_recorded, 1);

        mgr.complete_transaction().await.unwrap();
        let stats = mgr.session_statistics();
        assert_eq!(stats.transactions_started, 1);
        assert_eq!(stats.transactions_completed, 1);
        assert_eq!(stats.history_size, 1);
        assert!(!stats.transaction_in_progress);
    }
}
