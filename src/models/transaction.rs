//! Transaction and file operation data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Free-form metadata attached to transactions, operations and checkpoints.
pub type Metadata = HashMap<String, serde_json::Value>;

/// Kind of file-system mutation recorded by a generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileOperationType {
    Create,
    Update,
    Delete,
    Move,
    Copy,
    Symlink,
    Chmod,
    EnvVariable,
    PackageInstall,
    DirectoryCreate,
}

impl FileOperationType {
    /// Whether reverting this operation needs the previous content on disk.
    pub fn needs_backup(self) -> bool {
        matches!(self, FileOperationType::Update | FileOperationType::Delete)
    }
}

impl fmt::Display for FileOperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileOperationType::Create => "CREATE",
            FileOperationType::Update => "UPDATE",
            FileOperationType::Delete => "DELETE",
            FileOperationType::Move => "MOVE",
            FileOperationType::Copy => "COPY",
            FileOperationType::Symlink => "SYMLINK",
            FileOperationType::Chmod => "CHMOD",
            FileOperationType::EnvVariable => "ENV_VARIABLE",
            FileOperationType::PackageInstall => "PACKAGE_INSTALL",
            FileOperationType::DirectoryCreate => "DIRECTORY_CREATE",
        };
        f.write_str(name)
    }
}

/// A single recorded file mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileOperation {
    /// Operation ID, also the backup file name.
    pub id: String,
    /// Mutation type.
    #[serde(rename = "type")]
    pub op_type: FileOperationType,
    /// Absolute, normalized path of the affected resource.
    pub path: PathBuf,
    /// Location before a move.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_path: Option<PathBuf>,
    /// Content before the mutation, absent when the resource did not exist.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_content: Option<String>,
    /// Content after the mutation (informational).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_content: Option<String>,
    /// Unix permission bits before a chmod.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_mode: Option<u32>,
    /// SHA-256 of `previous_content`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Record time.
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: Metadata,
}

impl FileOperation {
    /// Whether a backup file was written for this operation.
    pub fn requires_backup(&self) -> bool {
        self.op_type.needs_backup()
            && self
                .previous_content
                .as_deref()
                .map(|c| !c.is_empty())
                .unwrap_or(false)
    }
}

/// Optional inputs to `UndoManager::add_operation`.
#[derive(Debug, Clone, Default)]
pub struct OperationOptions {
    pub previous_content: Option<String>,
    pub current_content: Option<String>,
    pub previous_path: Option<PathBuf>,
    pub previous_mode: Option<u32>,
    pub metadata: Metadata,
}

impl OperationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the content the resource had before the mutation.
    pub fn with_previous_content(mut self, content: impl Into<String>) -> Self {
        self.previous_content = Some(content.into());
        self
    }

    /// Set the content the resource has after the mutation.
    pub fn with_current_content(mut self, content: impl Into<String>) -> Self {
        self.current_content = Some(content.into());
        self
    }

    /// Set the source location of a move.
    pub fn with_previous_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.previous_path = Some(path.into());
        self
    }

    /// Set the permission bits before a chmod.
    pub fn with_previous_mode(mut self, mode: u32) -> Self {
        self.previous_mode = Some(mode);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Transaction lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    RolledBack,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::RolledBack => "rolled_back",
        };
        f.write_str(name)
    }
}

/// A group of file operations performed by one generator command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction ID, also the persisted file name.
    pub id: String,
    pub name: String,
    pub description: String,
    /// Command that opened the transaction.
    pub command: String,
    /// Operations in execution order.
    pub operations: Vec<FileOperation>,
    /// Start time.
    pub timestamp: DateTime<Utc>,
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: Metadata,
}

impl Transaction {
    /// Create a new pending transaction.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        command: impl Into<String>,
        metadata: Metadata,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            description: description.into(),
            command: command.into(),
            operations: Vec::new(),
            timestamp: Utc::now(),
            status: TransactionStatus::Pending,
            rollback_timestamp: None,
            metadata,
        }
    }

    pub fn is_rolled_back(&self) -> bool {
        self.status == TransactionStatus::RolledBack
    }

    /// Operations in the order a rollback processes them.
    pub fn operations_reversed(&self) -> impl Iterator<Item = &FileOperation> {
        self.operations.iter().rev()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operation(op_type: FileOperationType, previous: Option<&str>) -> FileOperation {
        FileOperation {
            id: "op".to_string(),
            op_type,
            path: PathBuf::from("/project/a.txt"),
            previous_path: None,
            previous_content: previous.map(str::to_string),
            current_content: None,
            previous_mode: None,
            checksum: None,
            timestamp: Utc::now(),
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn test_requires_backup() {
        assert!(operation(FileOperationType::Update, Some("old")).requires_backup());
        assert!(operation(FileOperationType::Delete, Some("old")).requires_backup());
        assert!(!operation(FileOperationType::Update, Some("")).requires_backup());
        assert!(!operation(FileOperationType::Update, None).requires_backup());
        assert!(!operation(FileOperationType::Create, Some("old")).requires_backup());
    }

    #[test]
    fn test_operation_type_serialization() {
        let json = serde_json::to_string(&FileOperationType::PackageInstall).unwrap();
        assert_eq!(json, "\"PACKAGE_INSTALL\"");
        let parsed: FileOperationType = serde_json::from_str("\"DIRECTORY_CREATE\"").unwrap();
        assert_eq!(parsed, FileOperationType::DirectoryCreate);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&TransactionStatus::RolledBack).unwrap();
        assert_eq!(json, "\"rolled_back\"");
    }

    #[test]
    fn test_new_transaction_is_pending() {
        let txn = Transaction::new("t", "d", "cmd", Metadata::new());
        assert_eq!(txn.status, TransactionStatus::Pending);
        assert!(txn.operations.is_empty());
        assert!(txn.rollback_timestamp.is_none());
    }
}
