//! Bulk import of uploaded CSV files into the Registry.
//!
//! An upload must carry exactly the configured header. The default upload
//! header lists `Disability Type` before `Age`, unlike the Registry file
//! itself; columns are mapped by name so either order lands in the right
//! fields. A Registry backup is always taken before the import is applied.

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::Serialize;
use tracing::info;

use super::backup::Backups;
use super::SharedStore;
use crate::access::AdminToken;
use crate::error::{Error, Result};
use crate::record::Record;

/// How uploaded rows are merged into the Registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Append, then drop rows identical to an earlier row.
    Append,
    /// Discard the current Registry and keep only the uploaded rows.
    Replace,
}

/// Outcome of an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Merge mode that was applied.
    pub mode: ImportMode,
    /// Data rows read from the upload.
    pub rows_read: usize,
    /// Rows removed as exact duplicates.
    pub duplicates_dropped: usize,
    /// Registry size after the import.
    pub total_after: usize,
    /// Backup taken before the import, if a Registry file existed.
    pub backup: Option<PathBuf>,
}

/// Reads uploaded files and merges them into the Registry.
#[derive(Debug)]
pub struct Importer<'a> {
    registry: &'a SharedStore,
    backups: &'a Backups,
    expected_columns: Vec<String>,
}

impl<'a> Importer<'a> {
    /// Create an importer that accepts files with `expected_columns`.
    #[must_use]
    pub fn new(
        registry: &'a SharedStore,
        backups: &'a Backups,
        expected_columns: Vec<String>,
    ) -> Self {
        Self {
            registry,
            backups,
            expected_columns,
        }
    }

    /// Read and schema-check an uploaded file without applying it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UploadSchema`] if the header differs from the
    /// expected columns, or a CSV/persistence error if the file is unreadable.
    pub fn read_upload(&self, path: &Path) -> Result<Vec<Record>> {
        let file = File::open(path).map_err(|e| Error::persistence(path, e))?;
        self.parse(file)
    }

    fn parse(&self, reader: impl std::io::Read) -> Result<Vec<Record>> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let found: Vec<String> = rdr.headers()?.iter().map(ToString::to_string).collect();
        if found != self.expected_columns {
            return Err(Error::UploadSchema {
                expected: self.expected_columns.join(", "),
                found: found.join(", "),
            });
        }

        let mut rows = Vec::new();
        for row in rdr.deserialize::<Record>() {
            rows.push(row?);
        }
        Ok(rows)
    }

    /// Back up the Registry, then merge the uploaded file into it.
    ///
    /// The upload is fully parsed before anything is written, so a bad file
    /// leaves both the Registry and the backup directory untouched.
    ///
    /// # Errors
    ///
    /// Returns a schema, CSV or persistence error.
    pub fn import(&self, token: &AdminToken, path: &Path, mode: ImportMode) -> Result<ImportReport> {
        let rows = self.read_upload(path)?;
        self.apply(token, rows, mode)
    }

    fn apply(&self, token: &AdminToken, rows: Vec<Record>, mode: ImportMode) -> Result<ImportReport> {
        let rows_read = rows.len();
        let report = self.registry.update(|records| {
            let backup = self.backups.create(token)?.map(|b| b.path);

            let duplicates_dropped = match mode {
                ImportMode::Append => {
                    records.extend(rows);
                    drop_duplicates(records)
                }
                ImportMode::Replace => {
                    *records = rows;
                    0
                }
            };

            let report = ImportReport {
                mode,
                rows_read,
                duplicates_dropped,
                total_after: records.len(),
                backup,
            };
            Ok((report, true))
        })?;

        info!(
            mode = ?report.mode,
            rows_read = report.rows_read,
            duplicates_dropped = report.duplicates_dropped,
            total_after = report.total_after,
            "Imported upload into Registry"
        );
        Ok(report)
    }
}

/// Remove rows identical to an earlier row, keeping first occurrences in
/// order. Returns how many rows were removed.
fn drop_duplicates(records: &mut Vec<Record>) -> usize {
    let before = records.len();
    let mut seen = HashSet::with_capacity(before);
    records.retain(|r| seen.insert(r.clone()));
    before - records.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::tests::admin;
    use crate::config::UploadConfig;
    use crate::record::tests::amina;
    use crate::storage::{CsvStore, RecordStore};

    const UPLOAD_HEADER: &str =
        "Name,Phone,Disability Type,Age,Assistive Device,Sub-County,Ward\n";

    struct Fixture {
        dir: tempfile::TempDir,
        registry: SharedStore,
        backups: Backups,
    }

    impl Fixture {
        fn new(existing: &[Record]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("registry.csv");
            let csv = CsvStore::new(&path);
            if !existing.is_empty() {
                csv.save(existing).unwrap();
            }
            let backups = Backups::new(&path, dir.path()).unwrap();
            Self {
                dir,
                registry: SharedStore::new(csv),
                backups,
            }
        }

        fn importer(&self) -> Importer<'_> {
            Importer::new(
                &self.registry,
                &self.backups,
                UploadConfig::default().expected_columns,
            )
        }

        fn upload(&self, body: &str) -> PathBuf {
            let path = self.dir.path().join("upload.csv");
            std::fs::write(&path, format!("{UPLOAD_HEADER}{body}")).unwrap();
            path
        }
    }

    fn kamau() -> Record {
        Record {
            name: "Kamau".to_string(),
            phone: "0733".to_string(),
            age: "51".to_string(),
            disability_type: "Hearing".to_string(),
            assistive_device: "Hearing Aid".to_string(),
            sub_county: "Mwingi North".to_string(),
            ward: "Kyuso".to_string(),
        }
    }

    #[test]
    fn test_upload_columns_mapped_by_name() {
        let fx = Fixture::new(&[]);
        let path = fx.upload("Amina,0711,Visual,34,White Cane,Kitui Central,Township\n");
        let rows = fx.importer().read_upload(&path).unwrap();
        assert_eq!(rows, vec![amina()]);
    }

    #[test]
    fn test_wrong_header_rejected_without_backup() {
        let fx = Fixture::new(&[amina()]);
        let path = fx.dir.path().join("upload.csv");
        std::fs::write(
            &path,
            "Name,Phone,Age,Disability Type,Assistive Device,Sub-County,Ward\n",
        )
        .unwrap();

        let err = fx
            .importer()
            .import(&admin(), &path, ImportMode::Append)
            .unwrap_err();
        assert!(matches!(err, Error::UploadSchema { .. }));
        assert!(fx.backups.list().unwrap().is_empty());
        assert_eq!(fx.registry.load().unwrap(), vec![amina()]);
    }

    #[test]
    fn test_append_drops_identical_rows() {
        let fx = Fixture::new(&[amina(), amina()]);
        let path = fx.upload(
            "Amina,0711,Visual,34,White Cane,Kitui Central,Township\n\
             Kamau,0733,Hearing,51,Hearing Aid,Mwingi North,Kyuso\n",
        );

        let report = fx
            .importer()
            .import(&admin(), &path, ImportMode::Append)
            .unwrap();
        assert_eq!(report.rows_read, 2);
        assert_eq!(report.duplicates_dropped, 2);
        assert_eq!(report.total_after, 2);
        assert!(report.backup.is_some());
        assert_eq!(fx.registry.load().unwrap(), vec![amina(), kamau()]);
    }

    #[test]
    fn test_replace_discards_existing_rows() {
        let fx = Fixture::new(&[amina()]);
        let path = fx.upload("Kamau,0733,Hearing,51,Hearing Aid,Mwingi North,Kyuso\n");

        let report = fx
            .importer()
            .import(&admin(), &path, ImportMode::Replace)
            .unwrap();
        assert_eq!(report.total_after, 1);
        assert_eq!(fx.registry.load().unwrap(), vec![kamau()]);

        let backups = fx.backups.list().unwrap();
        assert_eq!(backups.len(), 1);
        let saved = CsvStore::new(&backups[0].path);
        assert_eq!(saved.load().unwrap(), vec![amina()]);
    }

    #[test]
    fn test_import_into_missing_registry_skips_backup() {
        let fx = Fixture::new(&[]);
        let path = fx.upload("Kamau,0733,Hearing,51,Hearing Aid,Mwingi North,Kyuso\n");

        let report = fx
            .importer()
            .import(&admin(), &path, ImportMode::Append)
            .unwrap();
        assert!(report.backup.is_none());
        assert_eq!(fx.registry.load().unwrap(), vec![kamau()]);
    }

    #[test]
    fn test_drop_duplicates_keeps_first_occurrence_order() {
        let mut records = vec![kamau(), amina(), kamau(), amina(), kamau()];
        assert_eq!(drop_duplicates(&mut records), 3);
        assert_eq!(records, vec![kamau(), amina()]);
    }
}
