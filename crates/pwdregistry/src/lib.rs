//! `pwdregistry` - A registry of persons with disabilities and the assistive
//! devices they need.
//!
//! Members of the public submit requests into a Pending Queue. An
//! administrator holding the shared secret approves or rejects them; approved
//! requests join the Registry, which can also be maintained directly, bulk
//! imported, backed up and summarized.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod access;
pub mod cli;
pub mod config;
pub mod error;
pub mod intake;
pub mod locations;
pub mod logging;
pub mod moderation;
pub mod notify;
pub mod record;
pub mod registry;
pub mod report;
pub mod storage;

pub use access::{AccessGate, AdminToken};
pub use config::Config;
pub use error::{Error, Result};
pub use intake::{PendingEntry, PendingId, PendingListing, PendingQueue, QueueSnapshot};
pub use locations::LocationCatalog;
pub use logging::init_logging;
pub use moderation::{Decision, ModerationOutcome, Moderator};
pub use record::{Field, MemberSelector, PhoneKey, Record};
pub use registry::{MemberUpdate, Registry};
pub use report::{RecordFilter, Summary};
pub use storage::{Backups, CsvStore, ImportMode, Importer, LedgerFile, SharedStore};

/// Open the Pending Queue, Registry and backups described by `config`.
///
/// # Errors
///
/// Returns an error if the backup file pattern cannot be built.
pub fn open(config: &Config) -> Result<(PendingQueue, Registry, Backups)> {
    let catalog = config.location_catalog();
    let pending_path = config.pending_path();
    let queue = PendingQueue::new(
        SharedStore::new(CsvStore::new(&pending_path)),
        LedgerFile::beside(&pending_path),
        catalog.clone(),
    );
    let registry = Registry::new(
        SharedStore::new(CsvStore::new(config.registry_path())),
        catalog,
    );
    let backups = Backups::from_config(config)?;
    Ok((queue, registry, backups))
}
