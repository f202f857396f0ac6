//! Checkpoint data model.

use super::transaction::Metadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A named group of transactions that can be rolled back together.
///
/// Holds transaction IDs only. Transactions purged from history simply drop
/// out of what the checkpoint can roll back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub name: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    /// Grouped transaction IDs, oldest first.
    pub transaction_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: Metadata,
}

impl Checkpoint {
    /// Create a new checkpoint over the given transactions.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        transaction_ids: Vec<String>,
        metadata: Metadata,
    ) -> Self {
        let mut seen = std::collections::HashSet::new();
        let transaction_ids = transaction_ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            description: description.into(),
            timestamp: Utc::now(),
            transaction_ids,
            metadata,
        }
    }
}
