//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::intake::PendingId;
use crate::record::{MemberSelector, Record};
use crate::registry::MemberUpdate;
use crate::report::RecordFilter;
use crate::storage::ImportMode;

/// The seven fields of a record, as command-line options.
///
/// Blank values are passed through so the library reports every missing
/// field at once.
#[derive(Debug, Clone, Default, Args)]
pub struct RecordArgs {
    /// Full name
    #[arg(long, default_value = "")]
    pub name: String,

    /// Phone number
    #[arg(long, default_value = "")]
    pub phone: String,

    /// Age in years
    #[arg(long, default_value = "")]
    pub age: String,

    /// Disability type
    #[arg(long, default_value = "")]
    pub disability: String,

    /// Requested assistive device
    #[arg(long, default_value = "")]
    pub device: String,

    /// Sub-county
    #[arg(long, default_value = "")]
    pub sub_county: String,

    /// Ward within the sub-county
    #[arg(long, default_value = "")]
    pub ward: String,
}

impl From<RecordArgs> for Record {
    fn from(args: RecordArgs) -> Self {
        Self {
            name: args.name,
            phone: args.phone,
            age: args.age,
            disability_type: args.disability,
            assistive_device: args.device,
            sub_county: args.sub_county,
            ward: args.ward,
        }
    }
}

/// Pending Queue commands.
#[derive(Debug, Subcommand)]
pub enum PendingCommand {
    /// List submissions waiting for review
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Approve a submission and add it to the Registry
    Approve {
        /// Pending id as shown by `pending list`
        id: PendingId,
    },

    /// Reject a submission
    Reject {
        /// Pending id as shown by `pending list`
        id: PendingId,
    },
}

/// Registry maintenance commands.
#[derive(Debug, Subcommand)]
pub enum MemberCommand {
    /// Add a member directly to the Registry
    Add(RecordArgs),

    /// Delete the first member matching a name or identifier
    Delete {
        /// Exact name
        #[arg(long, required_unless_present = "identifier", conflicts_with = "identifier")]
        name: Option<String>,

        /// Composite label, "Name (Phone | Sub-County - Ward)"
        #[arg(long)]
        identifier: Option<String>,
    },

    /// Edit every member sharing the phone of the selected member
    Edit(EditCommand),

    /// List all members
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

impl MemberCommand {
    /// Build the selector for a `delete` command.
    #[must_use]
    pub fn delete_selector(name: Option<String>, identifier: Option<String>) -> Option<MemberSelector> {
        match (name, identifier) {
            (Some(name), None) => Some(MemberSelector::Name(name)),
            (None, Some(label)) => Some(MemberSelector::Identifier(label)),
            _ => None,
        }
    }
}

/// Edit command arguments.
#[derive(Debug, Args)]
pub struct EditCommand {
    /// Composite label of the member to edit
    #[arg(long)]
    pub identifier: String,

    /// New name
    #[arg(long)]
    pub name: Option<String>,

    /// New phone number
    #[arg(long)]
    pub phone: Option<String>,

    /// New age
    #[arg(long)]
    pub age: Option<String>,

    /// New sub-county
    #[arg(long)]
    pub sub_county: Option<String>,

    /// New ward
    #[arg(long)]
    pub ward: Option<String>,
}

impl EditCommand {
    /// Overlay the given options onto the current values of `current`.
    #[must_use]
    pub fn update_for(&self, current: &Record) -> MemberUpdate {
        let mut update = MemberUpdate::from_record(current);
        if let Some(name) = &self.name {
            update.name.clone_from(name);
        }
        if let Some(phone) = &self.phone {
            update.phone.clone_from(phone);
        }
        if let Some(age) = &self.age {
            update.age.clone_from(age);
        }
        if let Some(sub_county) = &self.sub_county {
            update.sub_county.clone_from(sub_county);
        }
        if let Some(ward) = &self.ward {
            update.ward.clone_from(ward);
        }
        update
    }
}

/// Import command arguments.
#[derive(Debug, Args)]
pub struct ImportCommand {
    /// CSV file to import
    pub file: PathBuf,

    /// How to merge the file into the Registry
    #[arg(short, long, value_enum, default_value = "append")]
    pub mode: ImportMode,
}

/// Backup commands.
#[derive(Debug, Subcommand)]
pub enum BackupCommand {
    /// Take a backup of the Registry now
    Create,

    /// List backups, newest first
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Overwrite the Registry with a backup
    Restore {
        /// Backup file to restore
        file: PathBuf,
    },
}

/// Report command arguments.
#[derive(Debug, Args)]
pub struct ReportCommand {
    /// Only include these sub-counties (repeatable)
    #[arg(long = "sub-county")]
    pub sub_counties: Vec<String>,

    /// Only include these wards (repeatable)
    #[arg(long = "ward")]
    pub wards: Vec<String>,

    /// Only include these disability types (repeatable)
    #[arg(long = "disability")]
    pub disabilities: Vec<String>,

    /// Only include these devices (repeatable)
    #[arg(long = "device")]
    pub devices: Vec<String>,

    /// List the matching records as well as the summary
    #[arg(short, long)]
    pub records: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

impl ReportCommand {
    /// Build the record filter from the repeated options.
    #[must_use]
    pub fn filter(&self) -> RecordFilter {
        fn set(values: &[String]) -> BTreeSet<String> {
            values.iter().map(|v| v.trim().to_string()).collect()
        }
        RecordFilter {
            sub_counties: set(&self.sub_counties),
            wards: set(&self.wards),
            disabilities: set(&self.disabilities),
            devices: set(&self.devices),
        }
    }
}

/// Search command arguments.
#[derive(Debug, Args)]
pub struct SearchCommand {
    /// Part of a name, matched ignoring case
    pub query: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}
