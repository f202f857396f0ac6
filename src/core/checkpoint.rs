//! Checkpoints: named groups of transactions rolled back together.

use crate::core::events::TransactionEvent;
use crate::core::manager::UndoManager;
use crate::models::checkpoint::Checkpoint;
use crate::models::rollback::{RollbackOptions, RollbackResult};
use crate::models::transaction::{Metadata, Transaction};
use crate::Result;
use futures::future::join_all;

impl UndoManager {
    /// Create a checkpoint over `transaction_ids`, or the most recent
    /// transactions when none are given.
    pub async fn create_checkpoint(
        &mut self,
        name: &str,
        description: &str,
        transaction_ids: Option<Vec<String>>,
        metadata: Option<Metadata>,
    ) -> Result<String> {
        let transaction_ids = match transaction_ids {
            Some(ids) => {
                if let Some(unknown) = ids.iter().find(|id| self.transaction(id).is_none()) {
                    return Err(crate::Error::TransactionNotFound(unknown.clone()));
                }
                ids
            }
            None => {
                let mut recent: Vec<String> = self
                    .transaction_history()
                    .into_iter()
                    .take(self.config().default_checkpoint_size)
                    .map(|t| t.id.clone())
                    .collect();
                recent.reverse();
                recent
            }
        };

        let checkpoint = Checkpoint::new(name, description, transaction_ids, metadata.unwrap_or_default());
        self.store().save_checkpoint(&checkpoint).await?;

        tracing::info!(
            "Checkpoint created: {} ({} transactions)",
            checkpoint.name,
            checkpoint.transaction_ids.len()
        );
        let id = checkpoint.id.clone();
        self.checkpoints.insert(id.clone(), checkpoint);
        Ok(id)
    }

    /// Look up a checkpoint.
    pub fn checkpoint(&self, id: &str) -> Option<&Checkpoint> {
        self.checkpoints.get(id)
    }

    /// All checkpoints, newest first.
    pub fn checkpoints(&self) -> Vec<&Checkpoint> {
        let mut checkpoints: Vec<&Checkpoint> = self.checkpoints.values().collect();
        checkpoints.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        checkpoints
    }

    /// Delete a checkpoint. The transactions it references are untouched.
    pub async fn delete_checkpoint(&mut self, id: &str) -> Result<()> {
        if self.checkpoints.remove(id).is_none() {
            return Err(crate::Error::CheckpointNotFound(id.to_string()));
        }
        self.store().delete_checkpoint(id).await?;
        tracing::info!("Checkpoint deleted: {}", id);
        Ok(())
    }

    /// Roll back every transaction of a checkpoint, newest first.
    ///
    /// Sequential by default, stopping at the first failure unless `force`.
    /// With `parallel` (and not `interactive`) all rollbacks run concurrently
    /// and one failure does not stop the others; this gives no ordering
    /// between transactions and is unsafe when they touch the same paths.
    pub async fn rollback_to_checkpoint(
        &mut self,
        checkpoint_id: &str,
        options: RollbackOptions,
    ) -> Result<Vec<RollbackResult>> {
        let checkpoint = self
            .checkpoint(checkpoint_id)
            .cloned()
            .ok_or_else(|| crate::Error::CheckpointNotFound(checkpoint_id.to_string()))?;

        let transactions = self.checkpoint_transactions(&checkpoint);
        tracing::info!(
            "Rolling back checkpoint {} ({} transactions)",
            checkpoint.name,
            transactions.len()
        );

        let mut results = Vec::with_capacity(transactions.len());

        if options.parallel && !options.interactive {
            for transaction in &transactions {
                self.stats.rollbacks_attempted += 1;
                self.events().publish(TransactionEvent::RollbackStarted {
                    transaction_id: transaction.id.clone(),
                });
            }

            let pending = join_all(
                transactions
                    .iter()
                    .map(|transaction| self.execute_rollback(transaction, &options)),
            )
            .await;

            for rollback in pending {
                results.push(self.finalize_rollback(rollback, &options).await);
            }
        } else {
            for transaction in &transactions {
                let result = self.rollback_transaction(&transaction.id, options).await;
                let failed = !result.success;
                results.push(result);

                if failed && !options.force {
                    tracing::warn!(
                        "Stopping checkpoint rollback after failure of {}",
                        transaction.id
                    );
                    break;
                }
            }
        }

        Ok(results)
    }

    /// Checkpoint transactions still in history, newest first.
    fn checkpoint_transactions(&self, checkpoint: &Checkpoint) -> Vec<Transaction> {
        let mut transactions: Vec<Transaction> = checkpoint
            .transaction_ids
            .iter()
            .filter_map(|id| {
                let found = self.transaction(id).cloned();
                if found.is_none() {
                    tracing::warn!("Checkpoint {} references purged transaction {}", checkpoint.id, id);
                }
                found
            })
            .collect();

        transactions.sort_by_key(|t| t.timestamp);
        transactions.reverse();
        transactions
    }
}
