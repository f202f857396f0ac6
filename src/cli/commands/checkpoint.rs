//! Checkpoint commands.

use super::rollback::print_summary;
use crate::core::events::TransactionEvent;
use crate::core::manager::UndoManager;
use crate::models::rollback::RollbackOptions;
use crate::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::error::RecvError;

/// Create a checkpoint.
pub async fn create(
    manager: &mut UndoManager,
    name: &str,
    description: &str,
    transactions: Vec<String>,
) -> Result<()> {
    let ids = if transactions.is_empty() {
        None
    } else {
        Some(transactions)
    };

    let id = manager.create_checkpoint(name, description, ids, None).await?;
    let checkpoint = manager
        .checkpoint(&id)
        .ok_or_else(|| crate::Error::CheckpointNotFound(id.clone()))?;

    println!("{} Checkpoint created: {}", "[OK]".green(), id.bold());
    println!("  {} {}", "Name:".bold(), checkpoint.name);
    println!("  {} {}", "Transactions:".bold(), checkpoint.transaction_ids.len());
    Ok(())
}

/// List checkpoints.
pub async fn list(manager: &UndoManager) -> Result<()> {
    println!("{}", "📌 Checkpoints".bold().cyan());
    println!();

    let checkpoints = manager.checkpoints();
    if checkpoints.is_empty() {
        println!("No checkpoints found.");
        return Ok(());
    }

    for checkpoint in checkpoints {
        let available = checkpoint
            .transaction_ids
            .iter()
            .filter(|id| manager.transaction(id).is_some())
            .count();
        println!(
            "  {} {} ({}/{} transactions available)",
            checkpoint.id.bold(),
            checkpoint.name,
            available,
            checkpoint.transaction_ids.len()
        );
        if !checkpoint.description.is_empty() {
            println!("      {}", checkpoint.description.dimmed());
        }
        println!(
            "      {} {}",
            "created:".dimmed(),
            checkpoint.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}

/// Roll back every transaction in a checkpoint.
pub async fn rollback(
    manager: &mut UndoManager,
    checkpoint_id: &str,
    options: RollbackOptions,
) -> Result<()> {
    let total = manager
        .checkpoint(checkpoint_id)
        .ok_or_else(|| crate::Error::CheckpointNotFound(checkpoint_id.to_string()))?
        .transaction_ids
        .len();

    println!("{} {}", "⏪ Rolling back checkpoint".bold().cyan(), checkpoint_id);
    if options.parallel {
        println!(
            "{}",
            "Parallel mode: transactions touching the same files may interfere".yellow()
        );
    }
    println!();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map_err(|e| crate::Error::other(e.to_string()))?
            .progress_chars("█▓░"),
    );

    let mut events = manager.subscribe();
    let bar = pb.clone();
    let listener = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(TransactionEvent::RollbackStarted { transaction_id }) => {
                    bar.set_message(transaction_id);
                }
                Ok(TransactionEvent::RollbackCompleted { .. }) => bar.inc(1),
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });

    let results = manager.rollback_to_checkpoint(checkpoint_id, options).await;
    listener.abort();
    pb.finish_with_message("Done!");
    println!();

    let results = results?;
    for result in &results {
        print_summary(result);
        println!();
    }

    let failed = results.iter().filter(|r| !r.success).count();
    if failed > 0 {
        return Err(crate::Error::other(format!(
            "{} of {} transactions failed to roll back",
            failed,
            results.len()
        )));
    }

    println!(
        "{} Rolled back {} transactions",
        "[OK]".green(),
        results.len()
    );
    Ok(())
}

/// Delete a checkpoint.
pub async fn delete(manager: &mut UndoManager, checkpoint_id: &str) -> Result<()> {
    manager.delete_checkpoint(checkpoint_id).await?;
    println!("{} Checkpoint deleted: {}", "[OK]".green(), checkpoint_id);
    Ok(())
}
