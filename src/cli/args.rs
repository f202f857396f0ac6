//! Command line argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Xaheen - undo and roll back changes made by code generators
#[derive(Parser, Debug)]
#[command(name = "xaheen")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project root (defaults to the current directory)
    #[arg(short = 'C', long, global = true, value_name = "PATH", default_value = ".")]
    pub project: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List recorded transactions
    History {
        /// Show at most this many transactions
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// List transactions that can still be rolled back
    Points,

    /// Show what rolling back a transaction would do
    Preview {
        /// Transaction ID
        #[arg(value_name = "TRANSACTION_ID")]
        transaction_id: String,
    },

    /// Roll back a transaction (the latest one by default)
    #[command(alias = "rollback")]
    Undo {
        /// Transaction ID
        #[arg(value_name = "TRANSACTION_ID")]
        transaction_id: Option<String>,

        /// Proceed despite missing backups and keep going after errors
        #[arg(long)]
        force: bool,

        /// Dry run - show what would be done
        #[arg(long)]
        dry_run: bool,

        /// Keep backup files after a successful rollback
        #[arg(long)]
        preserve_backups: bool,
    },

    /// Manage checkpoints
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointAction,
    },

    /// Show statistics for this session and the stored history
    Stats,

    /// Delete stored transactions and their backups
    Clean {
        /// Only delete transactions older than this many days
        #[arg(long, value_name = "DAYS")]
        older_than_days: Option<u32>,

        /// Confirm deletion
        #[arg(long)]
        confirm: bool,
    },

    /// Write a file inside a recorded transaction
    Write {
        /// File to write, relative to the project root
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// New content
        #[arg(long, conflicts_with = "from")]
        content: Option<String>,

        /// Read new content from this file
        #[arg(long, value_name = "FILE")]
        from: Option<PathBuf>,
    },

    /// Delete a file inside a recorded transaction
    Remove {
        /// File to delete, relative to the project root
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Move a file inside a recorded transaction
    Mv {
        /// Current location
        #[arg(value_name = "FROM")]
        from: PathBuf,

        /// New location
        #[arg(value_name = "TO")]
        to: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum CheckpointAction {
    /// Create a checkpoint
    Create {
        /// Checkpoint name
        #[arg(value_name = "NAME")]
        name: String,

        /// Description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Transactions to group (defaults to the most recent ones)
        #[arg(short, long = "transaction", value_name = "TRANSACTION_ID")]
        transactions: Vec<String>,
    },

    /// List checkpoints
    List,

    /// Roll back every transaction in a checkpoint
    Rollback {
        /// Checkpoint ID
        #[arg(value_name = "CHECKPOINT_ID")]
        checkpoint_id: String,

        /// Proceed despite missing backups and failed transactions
        #[arg(long)]
        force: bool,

        /// Dry run - show what would be done
        #[arg(long)]
        dry_run: bool,

        /// Roll back transactions concurrently
        #[arg(long)]
        parallel: bool,

        /// Keep backup files after a successful rollback
        #[arg(long)]
        preserve_backups: bool,
    },

    /// Delete a checkpoint (its transactions are kept)
    Delete {
        /// Checkpoint ID
        #[arg(value_name = "CHECKPOINT_ID")]
        checkpoint_id: String,
    },
}
