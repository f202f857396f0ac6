//! Rollback points offered to the user.

use crate::core::manager::UndoManager;
use crate::core::preview;
use crate::models::rollback::RollbackPoint;
use crate::models::transaction::TransactionStatus;

impl UndoManager {
    /// Completed transactions that can still be rolled back, newest first.
    pub async fn available_rollback_points(&self) -> Vec<RollbackPoint> {
        let mut points = Vec::new();

        for transaction in self
            .transaction_history()
            .into_iter()
            .filter(|t| t.status == TransactionStatus::Completed)
        {
            let preview =
                preview::analyze(transaction, self.backups(), self.config().verify_checksums).await;
            points.push(RollbackPoint {
                transaction_id: transaction.id.clone(),
                name: transaction.name.clone(),
                description: transaction.description.clone(),
                command: transaction.command.clone(),
                timestamp: transaction.timestamp,
                operation_count: transaction.operations.len(),
                risk_level: preview.overall_risk_level,
                can_proceed: preview.can_proceed,
            });
        }

        points
    }
}
