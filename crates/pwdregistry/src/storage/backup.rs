//! Timestamped Registry backups.
//!
//! A backup is a plain copy of the Registry file named
//! `<registry stem>_backup_<YYYYmmdd_HHMMSS>.csv`, with a `_<n>` suffix when
//! several backups are taken within one second. Existing backups are never
//! overwritten. Backups are discovered by matching that pattern in the backup
//! directory.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::PoisonError;

use chrono::{Local, NaiveDateTime};
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

use crate::access::AdminToken;
use crate::config::Config;
use crate::error::{Error, Result};

/// Timestamp format embedded in backup file names.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Most backups kept for a single second.
const MAX_PER_SECOND: u32 = 999;

/// A backup file found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Backup {
    /// Full path of the backup file.
    pub path: PathBuf,
    /// When the backup was taken, from the file name.
    pub taken_at: NaiveDateTime,
    /// Position among backups taken in the same second, starting at 1.
    #[serde(skip)]
    sequence: u32,
}

impl Backup {
    /// The file name without its directory.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Creates, lists and restores backups of one Registry file.
#[derive(Debug)]
pub struct Backups {
    registry_path: PathBuf,
    backup_dir: PathBuf,
    stem: String,
    pattern: Regex,
}

impl Backups {
    /// Manage backups of `registry_path`, stored in `backup_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file name pattern cannot be built.
    pub fn new(registry_path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Result<Self> {
        let registry_path = registry_path.into();
        let stem = registry_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "registry".to_string());
        let pattern = Regex::new(&format!(
            r"^{}_backup_(\d{{8}}_\d{{6}})(?:_(\d+))?\.csv$",
            regex::escape(&stem)
        ))
        .map_err(|e| Error::internal(format!("backup pattern: {e}")))?;

        Ok(Self {
            registry_path,
            backup_dir: backup_dir.into(),
            stem,
            pattern,
        })
    }

    /// Manage backups of the configured Registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the file name pattern cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.registry_path(), config.backup_dir())
    }

    /// Get the directory backups are written to.
    #[must_use]
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Copy the Registry file to a new timestamped backup.
    ///
    /// Returns `None` when there is no Registry file to back up yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy fails.
    pub fn create(&self, _token: &AdminToken) -> Result<Option<Backup>> {
        self.create_at(Local::now().naive_local())
    }

    pub(crate) fn create_at(&self, taken_at: NaiveDateTime) -> Result<Option<Backup>> {
        if !self.registry_path.exists() {
            warn!(
                "No Registry file at {}, skipping backup",
                self.registry_path.display()
            );
            return Ok(None);
        }
        if !self.backup_dir.exists() {
            fs::create_dir_all(&self.backup_dir).map_err(|source| Error::DirectoryCreate {
                path: self.backup_dir.clone(),
                source,
            })?;
        }

        let mut source =
            File::open(&self.registry_path).map_err(|e| Error::persistence(&self.registry_path, e))?;
        let stamp = taken_at.format(TIMESTAMP_FORMAT).to_string();
        let (path, sequence, mut target) = self.claim(&stamp)?;
        if let Err(e) = io::copy(&mut source, &mut target).and_then(|_| target.sync_all()) {
            let _ = fs::remove_file(&path);
            return Err(Error::persistence(&path, e));
        }

        info!(backup = %path.display(), "Registry backup saved");
        Ok(Some(Backup {
            path,
            taken_at,
            sequence,
        }))
    }

    /// Create the first backup file name for `stamp` that is not taken yet.
    fn claim(&self, stamp: &str) -> Result<(PathBuf, u32, File)> {
        for sequence in 1..=MAX_PER_SECOND {
            let name = if sequence == 1 {
                format!("{}_backup_{stamp}.csv", self.stem)
            } else {
                format!("{}_backup_{stamp}_{sequence}.csv", self.stem)
            };
            let path = self.backup_dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, sequence, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(Error::persistence(&path, e)),
            }
        }
        Err(Error::internal(format!("no free backup name for {stamp}")))
    }

    /// List existing backups, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup directory exists but cannot be read.
    pub fn list(&self) -> Result<Vec<Backup>> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();
        for entry in fs::read_dir(&self.backup_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(caps) = self.pattern.captures(name) else {
                continue;
            };
            let sequence = caps.get(2).map_or(Ok(1), |m| m.as_str().parse());
            match (NaiveDateTime::parse_from_str(&caps[1], TIMESTAMP_FORMAT), sequence) {
                (Ok(taken_at), Ok(sequence)) => backups.push(Backup {
                    path: entry.path(),
                    taken_at,
                    sequence,
                }),
                (_, Err(e)) => warn!(file = name, error = %e, "Ignoring backup with bad suffix"),
                (Err(e), _) => warn!(file = name, error = %e, "Ignoring backup with bad timestamp"),
            }
        }

        backups.sort_by(|a, b| {
            (b.taken_at, b.sequence).cmp(&(a.taken_at, a.sequence))
        });
        Ok(backups)
    }

    /// Copy `backup` over the live Registry file.
    ///
    /// Holds the Registry's store lock for the whole copy and replaces the
    /// file in one rename, so a failed restore leaves the Registry as it was.
    /// Must not be called while the Registry lock is already held.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `backup` does not exist, or a
    /// persistence error if the Registry file cannot be replaced (for
    /// example because another program holds it open).
    pub fn restore(&self, _token: &AdminToken, backup: &Path) -> Result<()> {
        if !backup.is_file() {
            return Err(Error::not_found(format!("backup {}", backup.display())));
        }
        let mut source = File::open(backup).map_err(|e| Error::persistence(backup, e))?;

        let lock = super::file_lock(&self.registry_path);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        super::write_atomic(&self.registry_path, |w| {
            io::copy(&mut source, w).map_err(|e| Error::persistence(backup, e))?;
            Ok(())
        })?;

        info!(
            backup = %backup.display(),
            registry = %self.registry_path.display(),
            "Registry restored from backup"
        );
        Ok(())
    }
}
