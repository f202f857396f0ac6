//! Integration tests for checkpoints.
//!
//! Tests cover:
//! - Default and explicit transaction selection
//! - Newest-first rollback order
//! - Sequential stop on failure versus parallel mode
//! - Purged and unknown transactions

use std::path::Path;
use tempfile::TempDir;
use xaheen::{
    Error, FileOperationType, OperationOptions, RollbackOptions, TransactionStatus, UndoConfig,
    UndoManager,
};

// ========== TEST FIXTURES ==========

async fn open(dir: &Path, config: UndoConfig) -> UndoManager {
    UndoManager::open(dir, config).await.unwrap()
}

/// Record the creation of `file`.
async fn record_create(mgr: &mut UndoManager, name: &str, file: &Path) -> String {
    let id = mgr.start_transaction(name, "", "generate", None).unwrap();
    mgr.add_operation(FileOperationType::Create, file, OperationOptions::new())
        .await
        .unwrap();
    std::fs::write(file, name).unwrap();
    mgr.complete_transaction().await.unwrap();
    id
}

/// Record an update of `file`, returning the transaction and operation IDs.
async fn record_update(mgr: &mut UndoManager, name: &str, file: &Path, content: &str) -> (String, String) {
    let id = mgr.start_transaction(name, "", "generate", None).unwrap();
    let op_id = mgr
        .add_operation(FileOperationType::Update, file, OperationOptions::new())
        .await
        .unwrap();
    std::fs::write(file, content).unwrap();
    mgr.complete_transaction().await.unwrap();
    (id, op_id)
}

// ========== CREATION TESTS ==========

#[tokio::test]
async fn test_default_checkpoint_takes_recent_transactions() {
    let dir = TempDir::new().unwrap();
    let config = UndoConfig {
        default_checkpoint_size: 2,
        ..Default::default()
    };
    let mut mgr = open(dir.path(), config).await;

    record_create(&mut mgr, "t1", &dir.path().join("1.txt")).await;
    let t2 = record_create(&mut mgr, "t2", &dir.path().join("2.txt")).await;
    let t3 = record_create(&mut mgr, "t3", &dir.path().join("3.txt")).await;

    let cp = mgr.create_checkpoint("recent", "", None, None).await.unwrap();
    assert_eq!(mgr.checkpoint(&cp).unwrap().transaction_ids, vec![t2, t3]);
}

#[tokio::test]
async fn test_checkpoint_rejects_unknown_transaction() {
    let dir = TempDir::new().unwrap();
    let mut mgr = open(dir.path(), UndoConfig::default()).await;
    let t1 = record_create(&mut mgr, "t1", &dir.path().join("1.txt")).await;

    let err = mgr
        .create_checkpoint("cp", "", Some(vec![t1, "nope".to_string()]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TransactionNotFound(ref id) if id == "nope"));
    assert!(mgr.checkpoints().is_empty());
}

#[tokio::test]
async fn test_delete_checkpoint_keeps_transactions() {
    let dir = TempDir::new().unwrap();
    let mut mgr = open(dir.path(), UndoConfig::default()).await;
    let t1 = record_create(&mut mgr, "t1", &dir.path().join("1.txt")).await;

    let cp = mgr.create_checkpoint("cp", "", None, None).await.unwrap();
    mgr.delete_checkpoint(&cp).await.unwrap();

    assert!(mgr.checkpoint(&cp).is_none());
    assert!(mgr.transaction(&t1).is_some());
    assert!(!dir
        .path()
        .join(".xaheen")
        .join("checkpoints")
        .join(format!("{}.json", cp))
        .exists());
    assert!(matches!(
        mgr.delete_checkpoint(&cp).await,
        Err(Error::CheckpointNotFound(_))
    ));
}

// ========== ROLLBACK TESTS ==========

#[tokio::test]
async fn test_unknown_checkpoint() {
    let dir = TempDir::new().unwrap();
    let mut mgr = open(dir.path(), UndoConfig::default()).await;

    let err = mgr
        .rollback_to_checkpoint("missing", RollbackOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CheckpointNotFound(_)));
}

#[tokio::test]
async fn test_rollback_newest_first() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("app.ts");
    std::fs::write(&file, "v0").unwrap();
    let mut mgr = open(dir.path(), UndoConfig::default()).await;

    let (t1, _) = record_update(&mut mgr, "t1", &file, "v1").await;
    let (t2, _) = record_update(&mut mgr, "t2", &file, "v2").await;
    let (t3, _) = record_update(&mut mgr, "t3", &file, "v3").await;

    // Listed out of order on purpose.
    let cp = mgr
        .create_checkpoint("cp", "", Some(vec![t1.clone(), t3.clone(), t2.clone()]), None)
        .await
        .unwrap();
    let results = mgr
        .rollback_to_checkpoint(&cp, RollbackOptions::default())
        .await
        .unwrap();

    let order: Vec<&str> = results.iter().map(|r| r.transaction_id.as_str()).collect();
    assert_eq!(order, vec![t3.as_str(), t2.as_str(), t1.as_str()]);
    assert!(results.iter().all(|r| r.success));
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "v0");
}

#[tokio::test]
async fn test_sequential_stops_at_failure() {
    let dir = TempDir::new().unwrap();
    let updated = dir.path().join("config.ts");
    std::fs::write(&updated, "v0").unwrap();
    let mut mgr = open(dir.path(), UndoConfig::default()).await;

    let t1 = record_create(&mut mgr, "t1", &dir.path().join("1.txt")).await;
    let (t2, op_id) = record_update(&mut mgr, "t2", &updated, "v1").await;
    let t3 = record_create(&mut mgr, "t3", &dir.path().join("3.txt")).await;
    std::fs::remove_file(dir.path().join(".xaheen").join("backups").join(format!("{}.bak", op_id)))
        .unwrap();

    let cp = mgr.create_checkpoint("cp", "", None, None).await.unwrap();
    let results = mgr
        .rollback_to_checkpoint(&cp, RollbackOptions::default())
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].transaction_id, t3);
    assert!(results[0].success);
    assert_eq!(results[1].transaction_id, t2);
    assert!(!results[1].success);
    assert_eq!(mgr.transaction(&t1).unwrap().status, TransactionStatus::Completed);
    assert!(dir.path().join("1.txt").exists());
}

#[tokio::test]
async fn test_parallel_rolls_back_independent_transactions() {
    let dir = TempDir::new().unwrap();
    let updated = dir.path().join("config.ts");
    std::fs::write(&updated, "v0").unwrap();
    let mut mgr = open(dir.path(), UndoConfig::default()).await;

    let t1 = record_create(&mut mgr, "t1", &dir.path().join("1.txt")).await;
    let (t2, op_id) = record_update(&mut mgr, "t2", &updated, "v1").await;
    let t3 = record_create(&mut mgr, "t3", &dir.path().join("3.txt")).await;
    std::fs::remove_file(dir.path().join(".xaheen").join("backups").join(format!("{}.bak", op_id)))
        .unwrap();

    let cp = mgr.create_checkpoint("cp", "", None, None).await.unwrap();
    let options = RollbackOptions {
        parallel: true,
        ..Default::default()
    };
    let results = mgr.rollback_to_checkpoint(&cp, options).await.unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results.iter().filter(|r| r.success).count(), 2);
    assert!(!dir.path().join("1.txt").exists());
    assert!(!dir.path().join("3.txt").exists());
    assert_eq!(std::fs::read_to_string(&updated).unwrap(), "v1");
    assert_eq!(mgr.transaction(&t1).unwrap().status, TransactionStatus::RolledBack);
    assert_eq!(mgr.transaction(&t2).unwrap().status, TransactionStatus::Completed);
    assert_eq!(mgr.transaction(&t3).unwrap().status, TransactionStatus::RolledBack);
    assert_eq!(mgr.session_statistics().rollbacks_attempted, 3);
}

#[tokio::test]
async fn test_purged_transactions_are_skipped() {
    let dir = TempDir::new().unwrap();
    let config = UndoConfig::default().with_max_transactions(2);
    let mut mgr = open(dir.path(), config).await;

    let t1 = record_create(&mut mgr, "t1", &dir.path().join("1.txt")).await;
    let t2 = record_create(&mut mgr, "t2", &dir.path().join("2.txt")).await;
    let cp = mgr
        .create_checkpoint("cp", "", Some(vec![t1.clone(), t2.clone()]), None)
        .await
        .unwrap();

    // Pushes t1 out of history.
    record_create(&mut mgr, "t3", &dir.path().join("3.txt")).await;
    assert!(mgr.transaction(&t1).is_none());

    let results = mgr
        .rollback_to_checkpoint(&cp, RollbackOptions::default())
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].transaction_id, t2);
    assert!(dir.path().join("1.txt").exists());
    assert!(!dir.path().join("2.txt").exists());
}
