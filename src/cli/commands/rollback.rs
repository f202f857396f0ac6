//! Preview and undo commands.

use super::history::risk_label;
use crate::core::manager::UndoManager;
use crate::models::rollback::{RollbackOptions, RollbackResult};
use crate::Result;
use colored::Colorize;

/// Show what rolling back a transaction would do.
pub async fn preview(manager: &UndoManager, transaction_id: &str) -> Result<()> {
    let preview = manager.preview_rollback(transaction_id).await?;

    println!("{} {}", "🔍 Rollback preview:".bold().cyan(), transaction_id);
    println!();
    println!("  {} {}", "Operations:".bold(), preview.total_operations);
    println!("  {} {}", "Risk:".bold(), risk_label(preview.overall_risk_level));
    println!("  {} ~{}ms", "Estimated time:".bold(), preview.estimated_duration);
    println!();

    for (i, op) in preview.operations.iter().enumerate() {
        println!(
            "  {}. [{}] {} {}",
            i + 1,
            risk_label(op.risk_level),
            op.op_type.to_string().bold(),
            op.action
        );
    }

    if !preview.warnings.is_empty() {
        println!();
        println!("{}", "⚠️  Warnings:".bold().yellow());
        for warning in &preview.warnings {
            println!("  - {}", warning);
        }
    }

    println!();
    if preview.can_proceed {
        println!("{}", "[OK] Rollback can proceed".green());
    } else {
        println!(
            "{}",
            "[BLOCKED] Required backups are missing, use --force to proceed".red()
        );
    }

    Ok(())
}

/// Roll back a transaction, the most recent rollback point by default.
pub async fn undo(
    manager: &mut UndoManager,
    transaction_id: Option<&str>,
    options: RollbackOptions,
) -> Result<()> {
    let transaction_id = match transaction_id {
        Some(id) => id.to_string(),
        None => {
            let points = manager.available_rollback_points().await;
            match points.first() {
                Some(point) => point.transaction_id.clone(),
                None => {
                    println!("Nothing to roll back.");
                    return Ok(());
                }
            }
        }
    };

    if options.dry_run {
        println!("{}", "🔍 Dry run - no changes will be made".bold().yellow());
    } else {
        println!("{} {}", "⏪ Rolling back".bold().cyan(), transaction_id);
    }
    println!();

    let result = manager.rollback_transaction(&transaction_id, options).await;
    print_summary(&result);

    if !result.success {
        return Err(crate::Error::other(format!(
            "Rollback of {} failed",
            transaction_id
        )));
    }
    Ok(())
}

/// Print a rollback result.
pub(crate) fn print_summary(result: &RollbackResult) {
    println!(
        "{} {}",
        "📊 Rollback Summary".bold().green(),
        result.transaction_id.dimmed()
    );
    println!("  {} {}", "Reverted:".bold(), result.rolled_back_operations);
    println!("  {} {}", "Skipped:".bold(), result.skipped_operations.len());
    println!("  {} {}", "Failed:".bold(), result.errors.len());
    println!("  {} {}", "Risk:".bold(), risk_label(result.risk_level));
    println!("  {} {:.2?}", "Duration:".bold(), result.duration);

    if !result.warnings.is_empty() {
        println!();
        println!("{}", "⚠️  Warnings:".bold().yellow());
        for warning in &result.warnings {
            println!("  - {}", warning);
        }
    }

    if !result.errors.is_empty() {
        println!();
        println!("{}", "❌ Errors:".bold().red());
        for error in &result.errors {
            println!("  - {}", error);
        }
    }

    println!();
    if result.success {
        println!("{}", "[OK] Rollback completed successfully!".green());
    } else if result.is_partial() {
        println!(
            "{}",
            "[WARNING] Rollback partially applied, re-run to retry the remaining operations"
                .yellow()
        );
    } else {
        println!("{}", "[FAILED] Nothing was rolled back".red());
    }
}
