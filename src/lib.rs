//! Xaheen undo library
//!
//! Records the file changes made by Xaheen code generators as transactions
//! and rolls them back on request, one transaction or a whole checkpoint at a time.

pub mod cli;
pub mod core;
pub mod error;
pub mod models;
pub mod utils;

pub use crate::core::events::TransactionEvent;
pub use crate::core::manager::UndoManager;
pub use error::{Error, Result};
pub use models::config::UndoConfig;
pub use models::rollback::{RiskLevel, RollbackOptions, RollbackPreview, RollbackResult};
pub use models::transaction::{FileOperationType, OperationOptions, TransactionStatus};
