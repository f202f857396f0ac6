//! Xaheen CLI
//!
//! Inspect and undo the file changes recorded by Xaheen code generators.

use clap::Parser;
use xaheen::cli::{
    args::{CheckpointAction, Cli, Commands},
    commands::{checkpoint, generate, history, rollback},
};
use xaheen::models::config::load_config;
use xaheen::{RollbackOptions, UndoManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    let config = load_config(&cli.project);
    let mut manager = UndoManager::open(&cli.project, config).await?;

    // Run the appropriate command
    match cli.command {
        Commands::History { limit } => {
            history::list_history(&manager, limit).await?;
        }

        Commands::Points => {
            history::list_points(&manager).await?;
        }

        Commands::Preview { transaction_id } => {
            rollback::preview(&manager, &transaction_id).await?;
        }

        Commands::Undo {
            transaction_id,
            force,
            dry_run,
            preserve_backups,
        } => {
            let options = RollbackOptions {
                force,
                dry_run,
                preserve_backups,
                ..Default::default()
            };
            rollback::undo(&mut manager, transaction_id.as_deref(), options).await?;
        }

        Commands::Checkpoint { action } => match action {
            CheckpointAction::Create {
                name,
                description,
                transactions,
            } => {
                checkpoint::create(&mut manager, &name, &description, transactions).await?;
            }
            CheckpointAction::List => {
                checkpoint::list(&manager).await?;
            }
            CheckpointAction::Rollback {
                checkpoint_id,
                force,
                dry_run,
                parallel,
                preserve_backups,
            } => {
                let options = RollbackOptions {
                    force,
                    dry_run,
                    parallel,
                    preserve_backups,
                    ..Default::default()
                };
                checkpoint::rollback(&mut manager, &checkpoint_id, options).await?;
            }
            CheckpointAction::Delete { checkpoint_id } => {
                checkpoint::delete(&mut manager, &checkpoint_id).await?;
            }
        },

        Commands::Stats => {
            history::show_stats(&manager).await?;
        }

        Commands::Clean {
            older_than_days,
            confirm,
        } => {
            history::clean(&mut manager, older_than_days, confirm).await?;
        }

        Commands::Write {
            path,
            content,
            from,
        } => {
            let content = match (content, from) {
                (Some(content), _) => content,
                (None, Some(from)) => tokio::fs::read_to_string(&from).await?,
                (None, None) => anyhow::bail!("Provide --content or --from"),
            };
            generate::write(&mut manager, &path, content).await?;
        }

        Commands::Remove { path } => {
            generate::remove(&mut manager, &path).await?;
        }

        Commands::Mv { from, to } => {
            generate::move_file(&mut manager, &from, &to).await?;
        }
    }

    Ok(())
}

/// Initialize the logging system.
fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("xaheen=debug")
    } else {
        EnvFilter::new("xaheen=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
