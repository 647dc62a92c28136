//! Identifier ledger of the Pending Queue.
//!
//! The queue file carries the Registry's columns and nothing else, so the
//! sequence numbers of its rows are kept in a small JSON file beside it. The
//! ledger holds the last number handed out, the number of every queue row in
//! file order, and a digest of the queue contents those numbers belong to.
//! Numbers only ever go up.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Error, Result};

/// Persistent numbering of the Pending Queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdLedger {
    /// Highest sequence number handed out so far.
    pub last_issued: u64,
    /// Digest of the queue contents `ids` were assigned to.
    pub queue_digest: String,
    /// Sequence number of each queue row, in file order.
    pub ids: Vec<u64>,
}

/// Where an [`IdLedger`] is kept.
///
/// Callers hold the queue's store lock around every load and save.
pub trait LedgerStore: fmt::Debug + Send + Sync {
    /// Human-readable location used in log lines.
    fn location(&self) -> String;

    /// Read the ledger. A ledger that was never written reads as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger exists but cannot be read or parsed.
    fn load(&self) -> Result<IdLedger>;

    /// Replace the ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be written.
    fn save(&self, ledger: &IdLedger) -> Result<()>;
}

/// A ledger kept in a JSON file.
#[derive(Debug, Clone)]
pub struct LedgerFile {
    path: PathBuf,
}

impl LedgerFile {
    /// Create a ledger for the file at `path`.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The ledger belonging to the queue file at `queue_path`:
    /// `pending_requests.csv` is numbered by `pending_requests.ids.json`.
    #[must_use]
    pub fn beside(queue_path: &Path) -> Self {
        Self::new(queue_path.with_extension("ids.json"))
    }

    /// Get the path to the ledger file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerStore for LedgerFile {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<IdLedger> {
        if !self.path.exists() {
            trace!("{} does not exist yet, reading as empty", self.path.display());
            return Ok(IdLedger::default());
        }
        let file = File::open(&self.path).map_err(|e| Error::persistence(&self.path, e))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    fn save(&self, ledger: &IdLedger) -> Result<()> {
        super::write_atomic(&self.path, |w| {
            serde_json::to_writer_pretty(&mut *w, ledger)?;
            writeln!(w)?;
            Ok(())
        })
    }
}

/// A ledger that lives only in process memory.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    ledger: Mutex<IdLedger>,
}

impl LedgerStore for MemoryLedger {
    fn location(&self) -> String {
        "memory".to_string()
    }

    fn load(&self) -> Result<IdLedger> {
        Ok(self
            .ledger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, ledger: &IdLedger) -> Result<()> {
        *self.ledger.lock().unwrap_or_else(PoisonError::into_inner) = ledger.clone();
        Ok(())
    }
}
