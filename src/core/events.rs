//! Transaction lifecycle events.

use crate::models::transaction::FileOperationType;
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::broadcast;

/// Events emitted by the undo manager for live progress reporting.
#[derive(Debug, Clone, Serialize)]
pub enum TransactionEvent {
    TransactionStarted {
        transaction_id: String,
        name: String,
        command: String,
    },
    OperationExecuted {
        transaction_id: String,
        operation_id: String,
        op_type: FileOperationType,
        path: PathBuf,
    },
    TransactionCompleted {
        transaction_id: String,
        operation_count: usize,
    },
    TransactionFailed {
        transaction_id: String,
        error: String,
    },
    RollbackStarted {
        transaction_id: String,
    },
    RollbackCompleted {
        transaction_id: String,
        success: bool,
        rolled_back_operations: usize,
    },
}

/// Broadcast channel for `TransactionEvent`s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TransactionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransactionEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Having no subscribers is fine.
    pub fn publish(&self, event: TransactionEvent) {
        tracing::trace!("Event: {:?}", event);
        let _ = self.sender.send(event);
    }
}
