//! History, rollback points, statistics and cleanup commands.

use crate::core::manager::UndoManager;
use crate::models::rollback::RiskLevel;
use crate::models::transaction::TransactionStatus;
use crate::Result;
use colored::{ColoredString, Colorize};

/// Color a risk level for display.
pub(crate) fn risk_label(risk: RiskLevel) -> ColoredString {
    match risk {
        RiskLevel::Low => risk.to_string().green(),
        RiskLevel::Medium => risk.to_string().yellow(),
        RiskLevel::High => risk.to_string().red().bold(),
    }
}

fn status_label(status: TransactionStatus) -> ColoredString {
    match status {
        TransactionStatus::Completed => status.to_string().green(),
        TransactionStatus::RolledBack => status.to_string().cyan(),
        TransactionStatus::Pending => status.to_string().yellow(),
        TransactionStatus::Failed => status.to_string().red(),
    }
}

/// List recorded transactions.
pub async fn list_history(manager: &UndoManager, limit: usize) -> Result<()> {
    println!("{}", "📜 Transaction History".bold().cyan());
    println!();

    let history = manager.transaction_history();
    if history.is_empty() {
        println!("No transactions recorded.");
        return Ok(());
    }

    println!(
        "{:<38} {:<20} {:<12} {:<5} {}",
        "Transaction ID".bold(),
        "Date".bold(),
        "Status".bold(),
        "Ops".bold(),
        "Name".bold()
    );
    println!("{}", "-".repeat(100));

    for txn in history.iter().take(limit) {
        println!(
            "{:<38} {:<20} {:<12} {:<5} {}",
            txn.id,
            txn.timestamp.format("%Y-%m-%d %H:%M:%S"),
            status_label(txn.status),
            txn.operations.len(),
            txn.name
        );
    }

    if history.len() > limit {
        println!("  ... and {} more", history.len() - limit);
    }

    Ok(())
}

/// List transactions that can still be rolled back.
pub async fn list_points(manager: &UndoManager) -> Result<()> {
    println!("{}", "⏪ Rollback Points".bold().cyan());
    println!();

    let points = manager.available_rollback_points().await;
    if points.is_empty() {
        println!("Nothing to roll back.");
        return Ok(());
    }

    for point in points {
        println!(
            "  {} {} [{}]",
            point.transaction_id.bold(),
            point.name,
            risk_label(point.risk_level)
        );
        println!(
            "      {} {}  {} {}  {} {}",
            "command:".dimmed(),
            point.command,
            "ops:".dimmed(),
            point.operation_count,
            "at:".dimmed(),
            point.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
        if !point.can_proceed {
            println!("      {}", "backups missing, --force required".yellow());
        }
    }

    Ok(())
}

/// Print session statistics.
pub async fn show_stats(manager: &UndoManager) -> Result<()> {
    let stats = manager.session_statistics();

    println!("{}", "📊 Statistics".bold().cyan());
    println!("  {} {}", "Stored transactions:".bold(), stats.history_size);
    println!("  {} {}", "Checkpoints:".bold(), stats.checkpoint_count);
    println!(
        "  {} {}",
        "Rollback points:".bold(),
        manager.available_rollback_points().await.len()
    );
    println!(
        "  {} {}",
        "Session started:".bold(),
        stats.session_started.format("%Y-%m-%d %H:%M:%S")
    );
    println!("  {} {}", "Transactions this session:".bold(), stats.transactions_started);
    println!("  {} {}", "Rollbacks this session:".bold(), stats.rollbacks_attempted);
    println!("  {} {}", "State directory:".bold(), manager.config().state_dir.display());

    Ok(())
}

/// Delete stored transactions.
pub async fn clean(manager: &mut UndoManager, older_than_days: Option<u32>, confirm: bool) -> Result<()> {
    let scope = match older_than_days {
        Some(days) => format!("transactions older than {} days", days),
        None => "all transactions".to_string(),
    };

    if !confirm {
        println!(
            "{} This will delete {} and their backups.",
            "[WARNING]".bold().yellow(),
            scope
        );
        println!("  Re-run with {} to proceed.", "--confirm".bold());
        return Ok(());
    }

    let removed = manager.clear_history(older_than_days).await?;
    println!("{} Removed {} transactions", "[OK]".green(), removed);
    Ok(())
}
