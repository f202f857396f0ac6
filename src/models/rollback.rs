//! Rollback options, results and previews.

use super::transaction::FileOperationType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// How risky it is to revert an operation or transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        };
        f.write_str(name)
    }
}

/// Rollback behaviour switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct RollbackOptions {
    /// Proceed past missing backups and keep going after operation errors.
    pub force: bool,
    /// Report what would happen without touching the file system.
    pub dry_run: bool,
    /// Keep backup files after a successful rollback.
    pub preserve_backups: bool,
    /// Caller prompts between steps; forces sequential checkpoint rollback.
    pub interactive: bool,
    /// Roll back checkpoint transactions concurrently.
    pub parallel: bool,
}

/// Outcome of rolling back one transaction.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RollbackResult {
    pub success: bool,
    pub transaction_id: String,
    /// Operations reverted (or that would be, in a dry run).
    pub rolled_back_operations: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// IDs of operations that had nothing to revert.
    pub skipped_operations: Vec<String>,
    pub duration: Duration,
    pub risk_level: RiskLevel,
}

impl RollbackResult {
    /// A failed result that never touched the file system.
    pub fn failed(transaction_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction_id: transaction_id.into(),
            errors: vec![error.into()],
            ..Default::default()
        }
    }

    /// Some operations were reverted before an error stopped the rollback.
    pub fn is_partial(&self) -> bool {
        !self.success && self.rolled_back_operations > 0
    }
}

/// Preview of reverting a single operation.
#[derive(Debug, Clone, Serialize)]
pub struct OperationPreview {
    pub operation_id: String,
    #[serde(rename = "type")]
    pub op_type: FileOperationType,
    pub path: PathBuf,
    /// What the rollback will do.
    pub action: String,
    pub has_backup: bool,
    pub risk_level: RiskLevel,
    /// Estimated time in milliseconds.
    pub estimated_time: u64,
}

/// Read-only assessment of a transaction rollback.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RollbackPreview {
    pub transaction_id: String,
    /// Per-operation previews, in rollback order.
    pub operations: Vec<OperationPreview>,
    pub warnings: Vec<String>,
    pub total_operations: usize,
    /// Estimated duration in milliseconds.
    pub estimated_duration: u64,
    pub overall_risk_level: RiskLevel,
    /// False when a required backup is missing or unusable.
    pub can_proceed: bool,
}

/// A completed transaction that can still be rolled back.
#[derive(Debug, Clone, Serialize)]
pub struct RollbackPoint {
    pub transaction_id: String,
    pub name: String,
    pub description: String,
    pub command: String,
    pub timestamp: DateTime<Utc>,
    pub operation_count: usize,
    pub risk_level: RiskLevel,
    pub can_proceed: bool,
}

/// Counters for one manager instance.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatistics {
    pub session_started: DateTime<Utc>,
    pub transactions_started: usize,
    pub transactions_completed: usize,
    pub transactions_failed: usize,
    pub operations_recorded: usize,
    pub rollbacks_attempted: usize,
    pub rollbacks_succeeded: usize,
    pub operations_rolled_back: usize,
    pub history_size: usize,
    pub checkpoint_count: usize,
    pub transaction_in_progress: bool,
}

impl SessionStatistics {
    pub fn new() -> Self {
        Self {
            session_started: Utc::now(),
            transactions_started: 0,
            transactions_completed: 0,
            transactions_failed: 0,
            operations_recorded: 0,
            rollbacks_attempted: 0,
            rollbacks_succeeded: 0,
            operations_rolled_back: 0,
            history_size: 0,
            checkpoint_count: 0,
            transaction_in_progress: false,
        }
    }
}

impl Default for SessionStatistics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_ordering() {
        assert!(RiskLevel::High > RiskLevel::Medium);
        assert!(RiskLevel::Medium > RiskLevel::Low);
        assert_eq!(RiskLevel::default(), RiskLevel::Low);
    }

    #[test]
    fn test_failed_result() {
        let result = RollbackResult::failed("t1", "Transaction not found: t1");
        assert!(!result.success);
        assert!(!result.is_partial());
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_partial_result() {
        let result = RollbackResult {
            success: false,
            rolled_back_operations: 2,
            errors: vec!["boom".to_string()],
            ..Default::default()
        };
        assert!(result.is_partial());
    }
}
