//! Command-line interface for pwdregistry.
//!
//! This module provides the CLI structure and output rendering for the
//! `pwdreg` binary.

mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    BackupCommand, ConfigCommand, EditCommand, ImportCommand, MemberCommand, OutputFormat,
    PendingCommand, RecordArgs, ReportCommand, SearchCommand,
};

/// pwdreg - Assistive device registry for persons with disabilities
///
/// Collects public requests for assistive devices, lets an administrator
/// approve them into the Registry, and reports on who needs what where.
#[derive(Debug, Parser)]
#[command(name = "pwdreg")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Admin secret for administrative commands
    #[arg(long, global = true, env = "PWDREG_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit a request for an assistive device
    Submit(RecordArgs),

    /// Review submissions waiting for approval
    #[command(subcommand)]
    Pending(PendingCommand),

    /// Maintain the Registry
    #[command(subcommand)]
    Member(MemberCommand),

    /// Import a CSV file into the Registry
    Import(ImportCommand),

    /// Create, list or restore Registry backups
    #[command(subcommand)]
    Backup(BackupCommand),

    /// Summarize the Registry
    Report(ReportCommand),

    /// Search members by name
    Search(SearchCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Command {
    /// Whether this command needs the admin secret.
    #[must_use]
    pub fn requires_admin(&self) -> bool {
        match self {
            Self::Pending(_) | Self::Import(_) => true,
            Self::Member(cmd) => !matches!(cmd, MemberCommand::List { .. }),
            Self::Backup(cmd) => !matches!(cmd, BackupCommand::List { .. }),
            Self::Submit(_) | Self::Report(_) | Self::Search(_) | Self::Config(_) => false,
        }
    }
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                2 => crate::logging::Verbosity::Debug,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
