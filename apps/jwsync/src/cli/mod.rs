//! # jwsync CLI Module
//!
//! This module implements the CLI interface for jwsync.
//!
//! ## Available Commands
//!
//! - `merge` - Merge two backups into a new one
//! - `inspect` - Summarise a backup
//! - `verify` - Check a backup's stored hash
//! - `server` - Start the HTTP server

mod commands;

use crate::config::AppConfig;
use clap::{Parser, Subcommand};
use jwsync_core::SyncError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// jwsync - merge JW Library backups
///
/// Combines two `.jwlibrary` backups into one without breaking the links
/// between notes, highlights, tags and locations.
#[derive(Parser, Debug)]
#[command(name = "jwsync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge two backups; the primary's keys are kept, conflicts follow the configured policy
    Merge {
        /// Backup whose keys are kept
        #[arg(short, long)]
        primary: PathBuf,

        /// Backup whose rows are merged in
        #[arg(short, long)]
        secondary: PathBuf,

        /// Output file, or directory for `<name>.jwlibrary` (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Summarise a backup
    Inspect {
        /// Path to the backup
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Check that a backup's stored hash matches its database
    Verify {
        /// Path to the backup
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Start HTTP server
    Server {
        /// Host to bind to (overrides the configuration)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides the configuration)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
///
/// `Ok(false)` means the command ran but its check failed (`verify` on a
/// backup whose hash does not match).
pub async fn execute(cli: Cli) -> Result<bool, SyncError> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let json_mode = cli.json_mode;

    match cli.command {
        Commands::Merge {
            primary,
            secondary,
            output,
        } => cmd_merge(&config, &primary, &secondary, output.as_deref(), json_mode).map(|()| true),
        Commands::Inspect { file } => cmd_inspect(&file, json_mode).map(|()| true),
        Commands::Verify { file } => cmd_verify(&file, json_mode),
        Commands::Server { host, port } => cmd_server(config, host, port).await.map(|()| true),
    }
}

// =============================================================================
// TESTS
// =============================================================================
