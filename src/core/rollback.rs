//! Rollback execution module.
//!
//! Reverses the operations of a completed transaction, last first:
//! - Delete created and copied files
//! - Restore updated and deleted files from their backups
//! - Move moved files back
//! - Remove created symlinks and empty directories, restore permissions

use crate::core::backup::BackupStore;
use crate::core::events::TransactionEvent;
use crate::core::manager::UndoManager;
use crate::core::preview;
use crate::models::rollback::{RollbackOptions, RollbackResult};
use crate::models::transaction::{FileOperation, FileOperationType, Transaction, TransactionStatus};
use crate::utils::{fs as fs_utils, hash};
use crate::Result;
use chrono::Utc;
use std::time::Instant;
use tokio::fs;

/// What reverting a single operation did.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Reverted {
    Done,
    /// Nothing to do, with the reason.
    Skipped(String),
}

/// File-system side of a rollback, before any state change is recorded.
#[derive(Debug, Default)]
pub struct RollbackOutcome {
    pub rolled_back: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub skipped: Vec<String>,
    /// Backups restored from; deleted once the whole rollback succeeds.
    pub consumed_backups: Vec<String>,
}

/// Reverses transaction operations on disk.
pub struct RollbackEngine<'a> {
    backups: &'a BackupStore,
    verify_checksums: bool,
}

impl<'a> RollbackEngine<'a> {
    pub fn new(backups: &'a BackupStore, verify_checksums: bool) -> Self {
        Self {
            backups,
            verify_checksums,
        }
    }

    /// Revert every operation in reverse order.
    ///
    /// Stops at the first error unless `force` is set.
    pub async fn run(&self, transaction: &Transaction, options: &RollbackOptions) -> RollbackOutcome {
        let mut outcome = RollbackOutcome::default();

        for op in transaction.operations_reversed() {
            if options.dry_run {
                tracing::info!("[DRY RUN] Revert {} {:?}", op.op_type, op.path);
                outcome.rolled_back += 1;
                continue;
            }

            match self.revert(op, options, &mut outcome).await {
                Ok(Reverted::Done) => {
                    outcome.rolled_back += 1;
                }
                Ok(Reverted::Skipped(reason)) => {
                    tracing::debug!("Skipped {} {:?}: {}", op.op_type, op.path, reason);
                    outcome.skipped.push(op.id.clone());
                }
                Err(e) => {
                    let error_msg = format!("{} {}: {}", op.op_type, op.path.display(), e);
                    tracing::error!("Rollback operation failed: {}", error_msg);
                    outcome.errors.push(error_msg);
                    if !options.force {
                        break;
                    }
                }
            }
        }

        outcome
    }

    /// Revert a single operation.
    async fn revert(
        &self,
        op: &FileOperation,
        options: &RollbackOptions,
        outcome: &mut RollbackOutcome,
    ) -> Result<Reverted> {
        match op.op_type {
            FileOperationType::Create | FileOperationType::Copy => {
                if fs_utils::remove_if_exists(&op.path).await? {
                    tracing::debug!("Deleted: {:?}", op.path);
                    Ok(Reverted::Done)
                } else {
                    Ok(Reverted::Skipped("file already absent".to_string()))
                }
            }
            FileOperationType::Update | FileOperationType::Delete => {
                self.restore(op, options, outcome).await
            }
            FileOperationType::Move => {
                let to = op.previous_path.as_ref().ok_or_else(|| {
                    crate::Error::InvalidOperation("move has no previous path".to_string())
                })?;

                if !fs_utils::path_exists(&op.path).await {
                    if fs_utils::path_exists(to).await {
                        return Ok(Reverted::Skipped("already at original location".to_string()));
                    }
                    return Err(crate::Error::InvalidOperation(format!(
                        "file not found at {} or {}",
                        op.path.display(),
                        to.display()
                    )));
                }

                if fs_utils::path_exists(to).await && !options.force {
                    return Err(crate::Error::InvalidOperation(format!(
                        "original location occupied: {}",
                        to.display()
                    )));
                }

                fs_utils::move_file(&op.path, to).await?;
                tracing::debug!("Moved back: {:?} -> {:?}", op.path, to);
                Ok(Reverted::Done)
            }
            FileOperationType::Symlink => match fs::symlink_metadata(&op.path).await {
                Ok(meta) if meta.file_type().is_symlink() => {
                    fs::remove_file(&op.path).await?;
                    tracing::debug!("Removed symlink: {:?}", op.path);
                    Ok(Reverted::Done)
                }
                Ok(_) => Err(crate::Error::InvalidOperation(format!(
                    "{} is no longer a symlink",
                    op.path.display()
                ))),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Ok(Reverted::Skipped("symlink already absent".to_string()))
                }
                Err(e) => Err(e.into()),
            },
            FileOperationType::DirectoryCreate => {
                if !fs_utils::path_exists(&op.path).await {
                    return Ok(Reverted::Skipped("directory already removed".to_string()));
                }

                let mut entries = fs::read_dir(&op.path).await?;
                if entries.next_entry().await?.is_some() {
                    outcome
                        .warnings
                        .push(format!("Directory not empty, left in place: {}", op.path.display()));
                    return Ok(Reverted::Skipped("directory not empty".to_string()));
                }

                fs::remove_dir(&op.path).await?;
                tracing::debug!("Removed directory: {:?}", op.path);
                Ok(Reverted::Done)
            }
            FileOperationType::Chmod => self.restore_mode(op).await,
            FileOperationType::EnvVariable | FileOperationType::PackageInstall => {
                outcome.warnings.push(format!(
                    "{} on {} must be reverted manually",
                    op.op_type,
                    op.path.display()
                ));
                Ok(Reverted::Skipped("manual action required".to_string()))
            }
        }
    }

    /// Put back the content an update or delete replaced.
    async fn restore(
        &self,
        op: &FileOperation,
        options: &RollbackOptions,
        outcome: &mut RollbackOutcome,
    ) -> Result<Reverted> {
        if !op.requires_backup() {
            return match (&op.previous_content, op.op_type) {
                (Some(content), _) => {
                    fs_utils::write_atomic(&op.path, content.as_bytes()).await?;
                    Ok(Reverted::Done)
                }
                (None, FileOperationType::Update) => {
                    if fs_utils::remove_if_exists(&op.path).await? {
                        Ok(Reverted::Done)
                    } else {
                        Ok(Reverted::Skipped("file did not exist before".to_string()))
                    }
                }
                (None, _) => Ok(Reverted::Skipped("no previous content recorded".to_string())),
            };
        }

        let content = self
            .backups
            .read(&op.id)
            .await?
            .ok_or_else(|| crate::Error::BackupMissing(op.id.clone()))?;

        if self.verify_checksums {
            if let Some(ref expected) = op.checksum {
                if &hash::sha256_bytes(&content) != expected {
                    if !options.force {
                        return Err(crate::Error::IntegrityMismatch(op.id.clone()));
                    }
                    outcome.warnings.push(format!(
                        "Restored {} from a backup that failed its checksum",
                        op.path.display()
                    ));
                }
            }
        }

        fs_utils::write_atomic(&op.path, &content).await?;
        outcome.consumed_backups.push(op.id.clone());
        tracing::debug!("Restored from backup: {:?}", op.path);
        Ok(Reverted::Done)
    }

    #[cfg(unix)]
    async fn restore_mode(&self, op: &FileOperation) -> Result<Reverted> {
        use std::os::unix::fs::PermissionsExt;

        let Some(mode) = op.previous_mode else {
            return Ok(Reverted::Skipped("previous mode not recorded".to_string()));
        };
        if !fs_utils::path_exists(&op.path).await {
            return Ok(Reverted::Skipped("file no longer exists".to_string()));
        }

        fs::set_permissions(&op.path, std::fs::Permissions::from_mode(mode)).await?;
        tracing::debug!("Restored mode {:o}: {:?}", mode, op.path);
        Ok(Reverted::Done)
    }

    #[cfg(not(unix))]
    async fn restore_mode(&self, _op: &FileOperation) -> Result<Reverted> {
        Ok(Reverted::Skipped("permission bits unsupported on this platform".to_string()))
    }
}

/// A rollback whose file-system work is done but not yet recorded.
pub(crate) struct PendingRollback {
    pub result: RollbackResult,
    pub consumed_backups: Vec<String>,
    pub started: Instant,
}

impl UndoManager {
    /// Roll back a completed transaction.
    ///
    /// Never fails: lookup, backup and file errors are reported in the result.
    /// Rolling back an already rolled back transaction is a no-op.
    pub async fn rollback_transaction(
        &mut self,
        transaction_id: &str,
        options: RollbackOptions,
    ) -> RollbackResult {
        self.stats.rollbacks_attempted += 1;

        let Some(transaction) = self.transaction(transaction_id).cloned() else {
            return RollbackResult::failed(
                transaction_id,
                crate::Error::TransactionNotFound(transaction_id.to_string()).to_string(),
            );
        };

        self.events().publish(TransactionEvent::RollbackStarted {
            transaction_id: transaction.id.clone(),
        });
        let pending = self.execute_rollback(&transaction, &options).await;
        self.finalize_rollback(pending, &options).await
    }

    /// Preview, then revert on disk. Does not change transaction state.
    pub(crate) async fn execute_rollback(
        &self,
        transaction: &Transaction,
        options: &RollbackOptions,
    ) -> PendingRollback {
        let started = Instant::now();
        let mut result = RollbackResult {
            transaction_id: transaction.id.clone(),
            ..Default::default()
        };

        if transaction.is_rolled_back() {
            result.success = true;
            result
                .warnings
                .push(format!("Transaction {} is already rolled back", transaction.id));
            return PendingRollback {
                result,
                consumed_backups: Vec::new(),
                started,
            };
        }

        if transaction.status != TransactionStatus::Completed {
            result.errors.push(format!(
                "Transaction {} is {}, only completed transactions can be rolled back",
                transaction.id, transaction.status
            ));
            return PendingRollback {
                result,
                consumed_backups: Vec::new(),
                started,
            };
        }

        let preview =
            preview::analyze(transaction, self.backups(), self.config().verify_checksums).await;
        result.risk_level = preview.overall_risk_level;
        result.warnings.extend(preview.warnings.iter().cloned());

        if !preview.can_proceed && !options.force {
            let missing: Vec<String> = preview
                .operations
                .iter()
                .filter(|p| !p.has_backup)
                .map(|p| p.path.display().to_string())
                .collect();
            result.errors.push(format!(
                "Rollback blocked, missing backups: {} (use force to proceed)",
                missing.join(", ")
            ));
            return PendingRollback {
                result,
                consumed_backups: Vec::new(),
                started,
            };
        }

        tracing::info!(
            "Rolling back {} ({} operations, {} risk)",
            transaction.id,
            transaction.operations.len(),
            preview.overall_risk_level
        );

        let outcome = RollbackEngine::new(self.backups(), self.config().verify_checksums)
            .run(transaction, options)
            .await;

        result.rolled_back_operations = outcome.rolled_back;
        result.errors = outcome.errors;
        result.warnings.extend(outcome.warnings);
        result.skipped_operations = outcome.skipped;

        PendingRollback {
            result,
            consumed_backups: outcome.consumed_backups,
            started,
        }
    }

    /// Record the outcome of a rollback: status, persistence, backups, events.
    pub(crate) async fn finalize_rollback(
        &mut self,
        pending: PendingRollback,
        options: &RollbackOptions,
    ) -> RollbackResult {
        let PendingRollback {
            mut result,
            consumed_backups,
            started,
        } = pending;

        // `success` is only preset for transactions that were already rolled back.
        let already_rolled_back = result.success;
        if !already_rolled_back && result.errors.is_empty() && !options.dry_run {
            if let Err(e) = self.mark_rolled_back(&result.transaction_id).await {
                result.errors.push(e.to_string());
            } else if !options.preserve_backups {
                for id in &consumed_backups {
                    if let Err(e) = self.backups().remove(id).await {
                        result.warnings.push(format!("Failed to remove backup {}: {}", id, e));
                    }
                }
            }
        }

        result.success = result.errors.is_empty();
        result.duration = started.elapsed();

        if result.success {
            self.stats.rollbacks_succeeded += 1;
        }
        if !options.dry_run {
            self.stats.operations_rolled_back += result.rolled_back_operations;
        }

        if result.is_partial() {
            tracing::warn!(
                "Partial rollback of {}: {} reverted, {} errors",
                result.transaction_id,
                result.rolled_back_operations,
                result.errors.len()
            );
        } else {
            tracing::info!(
                "Rollback of {} finished: success={}",
                result.transaction_id,
                result.success
            );
        }

        self.events().publish(TransactionEvent::RollbackCompleted {
            transaction_id: result.transaction_id.clone(),
            success: result.success,
            rolled_back_operations: result.rolled_back_operations,
        });

        result
    }

    /// Mark a transaction rolled back and persist it.
    ///
    /// The in-memory status is restored if the write fails.
    async fn mark_rolled_back(&mut self, transaction_id: &str) -> Result<()> {
        let transaction = self
            .transaction_mut(transaction_id)
            .ok_or_else(|| crate::Error::TransactionNotFound(transaction_id.to_string()))?;
        transaction.status = TransactionStatus::RolledBack;
        transaction.rollback_timestamp = Some(Utc::now());
        let snapshot = transaction.clone();

        if let Err(e) = self.store().save_transaction(&snapshot).await {
            if let Some(transaction) = self.transaction_mut(transaction_id) {
                transaction.status = TransactionStatus::Completed;
                transaction.rollback_timestamp = None;
            }
            return Err(e);
        }
        Ok(())
    }
}
