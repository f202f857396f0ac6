//! Error types for the undo engine.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the undo engine.
#[derive(Error, Debug)]
pub enum Error {
    // Transaction state errors
    #[error("Invalid transaction state: {0}")]
    State(String),

    #[error("Transaction already in progress: {0}")]
    Conflict(String),

    // Lookup errors
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Checkpoint not found: {0}")]
    CheckpointNotFound(String),

    // Backup errors
    #[error("Failed to write backup for operation {id}: {reason}")]
    BackupFailed { id: String, reason: String },

    #[error("Backup missing for operation {0}")]
    BackupMissing(String),

    #[error("Backup integrity check failed for operation {0}")]
    IntegrityMismatch(String),

    // Persistence errors
    #[error("Failed to persist {entity} {id}: {reason}")]
    Persistence {
        entity: &'static str,
        id: String,
        reason: String,
    },

    // Operation errors
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    // Config errors
    #[error("Invalid configuration: {0}")]
    Config(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // TOML errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Wrap a persistence failure for a transaction file.
    pub fn transaction_persistence(id: &str, err: impl std::fmt::Display) -> Self {
        Error::Persistence {
            entity: "transaction",
            id: id.to_string(),
            reason: err.to_string(),
        }
    }

    /// Wrap a persistence failure for a checkpoint file.
    pub fn checkpoint_persistence(id: &str, err: impl std::fmt::Display) -> Self {
        Error::Persistence {
            entity: "checkpoint",
            id: id.to_string(),
            reason: err.to_string(),
        }
    }

    /// True for errors caused by calling an API in the wrong transaction state.
    pub fn is_state_error(&self) -> bool {
        matches!(self, Error::State(_) | Error::Conflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_errors_are_classified() {
        assert!(Error::State("complete".into()).is_state_error());
        assert!(Error::Conflict("t1".into()).is_state_error());
        assert!(!Error::BackupMissing("op".into()).is_state_error());
    }

    #[test]
    fn test_persistence_message() {
        let err = Error::transaction_persistence("abc", "disk full");
        assert_eq!(err.to_string(), "Failed to persist transaction abc: disk full");
    }
}
