//! File mutations recorded as transactions.
//!
//! Each command wraps one change in start, add_operation and complete, the
//! bracket generators use, so it can be undone later.

use crate::core::manager::UndoManager;
use crate::models::transaction::{FileOperationType, OperationOptions};
use crate::utils::fs as fs_utils;
use crate::Result;
use colored::Colorize;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Complete the pending transaction, or abort it when the change failed.
async fn finish(manager: &mut UndoManager, applied: Result<()>) -> Result<String> {
    if let Err(e) = applied {
        if let Err(abort_err) = manager.abort_transaction().await {
            tracing::warn!("Failed to abort transaction: {}", abort_err);
        }
        return Err(e);
    }
    manager.complete_transaction().await
}

/// Record a DIRECTORY_CREATE for every missing ancestor of `path`, outermost first.
async fn record_missing_dirs(manager: &mut UndoManager, path: &Path) -> Result<()> {
    let mut missing: Vec<PathBuf> = Vec::new();
    let mut current = path.parent();
    while let Some(dir) = current {
        if dir.as_os_str().is_empty() || fs_utils::path_exists(dir).await {
            break;
        }
        missing.push(dir.to_path_buf());
        current = dir.parent();
    }

    for dir in missing.into_iter().rev() {
        manager
            .add_operation(FileOperationType::DirectoryCreate, &dir, OperationOptions::new())
            .await?;
        fs::create_dir(&dir).await?;
    }
    Ok(())
}

fn print_recorded(id: &str) {
    println!("{} Recorded transaction {}", "[OK]".green(), id.bold());
    println!("  Undo with: {}", format!("xaheen undo {}", id).bold());
}

/// Write a file.
pub async fn write(manager: &mut UndoManager, path: &Path, content: String) -> Result<()> {
    let target = fs_utils::normalize_path(manager.project_root(), path);
    let name = format!("write {}", path.display());

    manager.start_transaction(&name, &name, "write", None)?;
    let applied = apply_write(manager, &target, content).await;
    let id = finish(manager, applied).await?;

    print_recorded(&id);
    Ok(())
}

async fn apply_write(manager: &mut UndoManager, target: &Path, content: String) -> Result<()> {
    let op_type = if fs_utils::path_exists(target).await {
        FileOperationType::Update
    } else {
        record_missing_dirs(manager, target).await?;
        FileOperationType::Create
    };

    manager
        .add_operation(
            op_type,
            target,
            OperationOptions::new().with_current_content(content.clone()),
        )
        .await?;
    fs::write(target, content).await?;
    Ok(())
}

/// Delete a file.
pub async fn remove(manager: &mut UndoManager, path: &Path) -> Result<()> {
    let target = fs_utils::normalize_path(manager.project_root(), path);
    if !target.is_file() {
        return Err(crate::Error::InvalidOperation(format!(
            "not a file: {}",
            target.display()
        )));
    }
    let name = format!("remove {}", path.display());

    manager.start_transaction(&name, &name, "remove", None)?;
    let applied = apply_remove(manager, &target).await;
    let id = finish(manager, applied).await?;

    print_recorded(&id);
    Ok(())
}

async fn apply_remove(manager: &mut UndoManager, target: &Path) -> Result<()> {
    manager
        .add_operation(FileOperationType::Delete, target, OperationOptions::new())
        .await?;
    fs::remove_file(target).await?;
    Ok(())
}

/// Move a file.
pub async fn move_file(manager: &mut UndoManager, from: &Path, to: &Path) -> Result<()> {
    let source = fs_utils::normalize_path(manager.project_root(), from);
    let target = fs_utils::normalize_path(manager.project_root(), to);
    if !source.is_file() {
        return Err(crate::Error::InvalidOperation(format!(
            "not a file: {}",
            source.display()
        )));
    }
    if fs_utils::path_exists(&target).await {
        return Err(crate::Error::InvalidOperation(format!(
            "target already exists: {}",
            target.display()
        )));
    }
    let name = format!("mv {} {}", from.display(), to.display());

    manager.start_transaction(&name, &name, "mv", None)?;
    let applied = apply_move(manager, &source, &target).await;
    let id = finish(manager, applied).await?;

    print_recorded(&id);
    Ok(())
}

async fn apply_move(manager: &mut UndoManager, source: &Path, target: &Path) -> Result<()> {
    record_missing_dirs(manager, target).await?;
    manager
        .add_operation(
            FileOperationType::Move,
            target,
            OperationOptions::new().with_previous_path(source),
        )
        .await?;
    fs_utils::move_file(source, target).await?;
    Ok(())
}
