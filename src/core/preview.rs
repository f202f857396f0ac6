//! Rollback preview and risk assessment.
//!
//! Read-only: inspects a transaction and its backups, never touches the
//! files the transaction changed.

use crate::core::backup::{BackupState, BackupStore};
use crate::core::manager::UndoManager;
use crate::models::rollback::{OperationPreview, RiskLevel, RollbackPreview};
use crate::models::transaction::{FileOperation, FileOperationType, Transaction};
use crate::utils::fs as fs_utils;
use crate::Result;

/// Estimated time to revert an operation, in milliseconds.
pub fn estimated_time(op_type: FileOperationType) -> u64 {
    match op_type {
        FileOperationType::Create
        | FileOperationType::Copy
        | FileOperationType::Symlink
        | FileOperationType::Chmod
        | FileOperationType::DirectoryCreate => 50,
        FileOperationType::Move | FileOperationType::EnvVariable => 100,
        FileOperationType::Update => 150,
        FileOperationType::Delete => 200,
        FileOperationType::PackageInstall => 5000,
    }
}

/// Combine per-operation risks.
///
/// High if any operation is high, medium if more than half are medium.
pub fn overall_risk(levels: &[RiskLevel]) -> RiskLevel {
    if levels.contains(&RiskLevel::High) {
        return RiskLevel::High;
    }
    let medium = levels.iter().filter(|l| **l == RiskLevel::Medium).count();
    if medium * 2 > levels.len() {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Assessment of a single operation.
struct Assessment {
    preview: OperationPreview,
    warning: Option<String>,
    /// The rollback cannot proceed without force.
    blocking: bool,
}

/// Preview the rollback of a transaction.
pub async fn analyze(
    transaction: &Transaction,
    backups: &BackupStore,
    verify_checksums: bool,
) -> RollbackPreview {
    let mut preview = RollbackPreview {
        transaction_id: transaction.id.clone(),
        can_proceed: true,
        ..Default::default()
    };

    for op in transaction.operations_reversed() {
        let assessment = assess(op, backups, verify_checksums).await;
        if let Some(warning) = assessment.warning {
            preview.warnings.push(warning);
        }
        if assessment.blocking {
            preview.can_proceed = false;
        }
        preview.estimated_duration += assessment.preview.estimated_time;
        preview.operations.push(assessment.preview);
    }

    let levels: Vec<RiskLevel> = preview.operations.iter().map(|p| p.risk_level).collect();
    preview.total_operations = preview.operations.len();
    preview.overall_risk_level = overall_risk(&levels);
    preview
}

async fn assess(op: &FileOperation, backups: &BackupStore, verify_checksums: bool) -> Assessment {
    let path = op.path.display();
    let mut warning = None;
    let mut blocking = false;
    let mut has_backup = true;

    let (action, risk_level) = match op.op_type {
        FileOperationType::Create => (format!("Delete created file {}", path), RiskLevel::Low),
        FileOperationType::Copy => (format!("Delete copied file {}", path), RiskLevel::Low),
        FileOperationType::Symlink => (format!("Remove symlink {}", path), RiskLevel::Low),
        FileOperationType::DirectoryCreate => {
            (format!("Remove directory {} if empty", path), RiskLevel::Low)
        }
        FileOperationType::Update | FileOperationType::Delete => {
            let verb = if op.op_type == FileOperationType::Update {
                "Restore previous content of"
            } else {
                "Restore deleted file"
            };
            match backups.inspect(op, verify_checksums).await {
                BackupState::Present => (format!("{} {} from backup", verb, path), RiskLevel::Low),
                BackupState::NotRequired => match (&op.previous_content, op.op_type) {
                    (None, FileOperationType::Update) => {
                        (format!("Remove {} (did not exist before)", path), RiskLevel::Low)
                    }
                    (None, _) => (format!("Nothing to restore for {}", path), RiskLevel::Low),
                    (Some(_), _) => (format!("{} {} as an empty file", verb, path), RiskLevel::Low),
                },
                BackupState::Missing => {
                    has_backup = false;
                    blocking = true;
                    warning = Some(format!("No backup found for {} ({})", path, op.id));
                    (format!("{} {} (backup missing)", verb, path), RiskLevel::High)
                }
                BackupState::Corrupt => {
                    has_backup = false;
                    blocking = true;
                    warning = Some(format!(
                        "Backup for {} does not match its checksum ({})",
                        path, op.id
                    ));
                    (format!("{} {} (backup corrupt)", verb, path), RiskLevel::High)
                }
            }
        }
        FileOperationType::Move => match &op.previous_path {
            Some(previous) => {
                let action = format!("Move {} back to {}", path, previous.display());
                if fs_utils::path_exists(&op.path).await {
                    (action, RiskLevel::Low)
                } else {
                    (action, RiskLevel::Medium)
                }
            }
            None => {
                warning = Some(format!("Move of {} has no recorded source path", path));
                (format!("Cannot move {} back", path), RiskLevel::Medium)
            }
        },
        FileOperationType::Chmod => match op.previous_mode {
            Some(mode) => (format!("Restore mode {:o} on {}", mode, path), RiskLevel::Low),
            None => (
                format!("Cannot restore permissions of {} (mode not recorded)", path),
                RiskLevel::Medium,
            ),
        },
        FileOperationType::EnvVariable => (
            format!("Revert environment change for {} manually", path),
            RiskLevel::Medium,
        ),
        FileOperationType::PackageInstall => (
            format!("Uninstall package recorded at {} manually", path),
            RiskLevel::Medium,
        ),
    };

    Assessment {
        preview: OperationPreview {
            operation_id: op.id.clone(),
            op_type: op.op_type,
            path: op.path.clone(),
            action,
            has_backup,
            risk_level,
            estimated_time: estimated_time(op.op_type),
        },
        warning,
        blocking,
    }
}

impl UndoManager {
    /// Preview rolling back a transaction without changing anything.
    pub async fn preview_rollback(&self, transaction_id: &str) -> Result<RollbackPreview> {
        let transaction = self
            .transaction(transaction_id)
            .ok_or_else(|| crate::Error::TransactionNotFound(transaction_id.to_string()))?;
        Ok(analyze(transaction, self.backups(), self.config().verify_checksums).await)
    }
}
