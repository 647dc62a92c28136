//! Storage layer for pwdregistry.
//!
//! Both the Registry and the Pending Queue are whole-sequence stores: every
//! mutation loads the full record list, changes it in memory and writes the
//! full list back. The [`RecordStore`] trait is the only persistence seam the
//! workflow code sees, so the on-disk format can change without touching it.
//!
//! A [`SharedStore`] wraps a backend with a process-wide mutex. File-backed
//! stores share one mutex per file, however many handles are opened on it, so
//! holding a [`StoreGuard`] serializes a complete read-modify-write cycle
//! against every other caller in the same process. Separate processes sharing
//! one file are not coordinated; the last writer wins.

pub mod backup;
mod csv_file;
pub mod ledger;
mod memory;
pub mod upload;

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::debug;

use crate::error::{Error, Result};
use crate::record::Record;

pub use backup::{Backup, Backups};
pub use csv_file::CsvStore;
pub use ledger::{IdLedger, LedgerFile, LedgerStore, MemoryLedger};
pub use memory::MemoryStore;
pub use upload::{ImportMode, ImportReport, Importer};

/// The mutex guarding every handle on the file at `path`.
pub(crate) fn file_lock(path: &Path) -> Arc<Mutex<()>> {
    static LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();

    let mut locks = LOCKS
        .get_or_init(Mutex::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    Arc::clone(locks.entry(lock_key(path)).or_default())
}

/// Resolve `path` to one spelling per file.
///
/// The file itself may not exist yet, so the deepest existing ancestor is
/// canonicalized and the remaining components are appended to it.
fn lock_key(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map_or_else(|_| path.to_path_buf(), |dir| dir.join(path))
    };

    let mut rest = Vec::new();
    let mut current = absolute.as_path();
    loop {
        if let Ok(resolved) = fs::canonicalize(current) {
            return rest.iter().rev().fold(resolved, |acc, part| acc.join(part));
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                current = parent;
            }
            _ => return absolute,
        }
    }
}

/// Replace the file at `path` with whatever `write` produces.
///
/// The content goes to a uniquely named sibling first and is renamed over
/// `path` only once complete, so a failed write never truncates the live file.
pub(crate) fn write_atomic(
    path: &Path,
    write: impl FnOnce(&mut dyn Write) -> Result<()>,
) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|source| Error::DirectoryCreate {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::persistence(dir, e))?;
    write(tmp.as_file_mut())?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| Error::persistence(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| Error::persistence(path, e.error))?;
    Ok(())
}

/// A persistent, ordered sequence of records.
pub trait RecordStore: fmt::Debug + Send + Sync {
    /// Human-readable location used in log lines.
    fn location(&self) -> String;

    /// Read the whole sequence in stored order.
    ///
    /// A store that has never been written reads as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read or parsed.
    fn load(&self) -> Result<Vec<Record>>;

    /// Replace the whole sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written. The previous
    /// contents must remain readable when this fails.
    fn save(&self, records: &[Record]) -> Result<()>;

    /// The file behind this store, if any.
    ///
    /// Stores that name a file share one lock with every other handle on that
    /// file. Stores without one are locked per instance.
    fn file(&self) -> Option<&Path> {
        None
    }
}

/// A record store guarded by a process-wide lock.
#[derive(Debug)]
pub struct SharedStore {
    inner: Box<dyn RecordStore>,
    lock: Arc<Mutex<()>>,
}

impl SharedStore {
    /// Wrap a backend.
    #[must_use]
    pub fn new(store: impl RecordStore + 'static) -> Self {
        let lock = store
            .file()
            .map_or_else(|| Arc::new(Mutex::new(())), file_lock);
        Self {
            inner: Box::new(store),
            lock,
        }
    }

    /// Acquire exclusive access for a read-modify-write cycle.
    ///
    /// A panic in a previous holder does not leave the store unusable: the
    /// file on disk is the source of truth and is re-read after locking.
    pub fn lock(&self) -> StoreGuard<'_> {
        let guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        StoreGuard {
            store: self.inner.as_ref(),
            _guard: guard,
        }
    }

    /// Read the current contents under the lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    pub fn load(&self) -> Result<Vec<Record>> {
        self.lock().load()
    }

    /// Load, apply `f`, and save only if `f` reports a change.
    ///
    /// `f` returns its result together with a flag telling whether the record
    /// list was modified. Nothing is written when `f` fails or makes no change.
    ///
    /// # Errors
    ///
    /// Returns the error from `f`, or a storage error from load/save.
    pub fn update<T>(&self, f: impl FnOnce(&mut Vec<Record>) -> Result<(T, bool)>) -> Result<T> {
        let guard = self.lock();
        let mut records = guard.load()?;
        let (value, changed) = f(&mut records)?;
        if changed {
            guard.save(&records)?;
        }
        Ok(value)
    }

    /// Human-readable location of the backing storage.
    #[must_use]
    pub fn location(&self) -> String {
        self.inner.location()
    }
}

/// Exclusive access to a [`SharedStore`] for the lifetime of the guard.
pub struct StoreGuard<'a> {
    store: &'a dyn RecordStore,
    _guard: MutexGuard<'a, ()>,
}

impl StoreGuard<'_> {
    /// Read the current contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    pub fn load(&self) -> Result<Vec<Record>> {
        let records = self.store.load()?;
        debug!(
            location = %self.store.location(),
            count = records.len(),
            "Loaded records"
        );
        Ok(records)
    }

    /// Replace the contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    pub fn save(&self, records: &[Record]) -> Result<()> {
        self.store.save(records)?;
        debug!(
            location = %self.store.location(),
            count = records.len(),
            "Saved records"
        );
        Ok(())
    }
}

impl fmt::Debug for StoreGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreGuard")
            .field("store", &self.store.location())
            .finish_non_exhaustive()
    }
}
