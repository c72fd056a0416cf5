use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "safe-sweeper")]
#[command(about = "A risk-aware, reversible disk sweeper", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Classify scanned candidates and build a cleanup plan
    Plan {
        /// JSON or JSON-lines file of candidate items from the scanner
        #[arg(long)]
        input: PathBuf,
        /// Free-form description of the scan batch
        #[arg(long, default_value = "manual scan")]
        descriptor: String,
        /// Skip advisor escalation even when configured
        #[arg(long)]
        no_escalate: bool,
    },
    /// Execute a cleanup plan (backup, then delete)
    Execute {
        plan_id: String,
        /// Also delete dangerous-tier items
        #[arg(long)]
        include_dangerous: bool,
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
        /// Write a CSV execution report to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Restore a cleaned execution from its backups
    Restore {
        execution_id: String,
        /// Restore only these plan item ids (default: everything)
        #[arg(long)]
        items: Vec<i64>,
    },
    /// List undo history entries
    History,
    /// Prune backup payloads past the retention window
    Prune {
        /// Override the configured retention in days
        #[arg(long)]
        days: Option<i64>,
    },
    /// Print configuration values
    PrintConfig,
    /// Truncate all database tables
    TruncateDb,
}
