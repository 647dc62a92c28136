//! CSV file backend.
//!
//! Files carry the header `Name,Phone,Age,Disability Type,Assistive Device,Sub-County,Ward`.
//! Columns are matched by name on read, so files with extra columns (for
//! example a spreadsheet index) still load; writes always emit exactly the
//! canonical header in canonical order.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use super::RecordStore;
use crate::error::{Error, Result};
use crate::record::{Record, REGISTRY_COLUMNS};

/// A record store kept in a single CSV file.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    /// Create a store for the file at `path`.
    ///
    /// Nothing is touched on disk until the first save.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Get the path to the CSV file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check whether the file has been created.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Parse records from any reader carrying a header row.
    pub(crate) fn read_from(reader: impl std::io::Read) -> Result<Vec<Record>> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let mut records = Vec::new();
        for row in rdr.deserialize::<Record>() {
            records.push(row?);
        }
        Ok(records)
    }

    /// Write the canonical header followed by `records`.
    pub(crate) fn write_to(writer: impl Write, records: &[Record]) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);

        // Written explicitly so an empty store still has a header row
        wtr.write_record(REGISTRY_COLUMNS)?;
        for record in records {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl RecordStore for CsvStore {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<Vec<Record>> {
        if !self.path.exists() {
            trace!("{} does not exist yet, reading as empty", self.path.display());
            return Ok(Vec::new());
        }
        let file = File::open(&self.path).map_err(|e| Error::persistence(&self.path, e))?;
        Self::read_from(file)
    }

    fn save(&self, records: &[Record]) -> Result<()> {
        super::write_atomic(&self.path, |w| Self::write_to(BufWriter::new(w), records))?;
        debug!("Wrote {} rows to {}", records.len(), self.path.display());
        Ok(())
    }

    fn file(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::amina;
    use std::fs;

    fn john(name: &str) -> Record {
        Record {
            name: name.to_string(),
            phone: "0722".to_string(),
            age: String::new(),
            disability_type: "Physical".to_string(),
            assistive_device: "Wheelchair".to_string(),
            sub_county: "Kitui Rural".to_string(),
            ward: "Mbitini".to_string(),
        }
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("absent.csv"));
        assert!(!store.exists());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load_preserves_order_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("registry.csv"));
        let records = vec![john("John"), amina(), john("John K"), amina()];

        store.save(&records).unwrap();
        assert_eq!(store.load().unwrap(), records);
    }

    #[test]
    fn test_save_writes_canonical_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.csv");
        let store = CsvStore::new(&path);

        store.save(&[amina()]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Name,Phone,Age,Disability Type,Assistive Device,Sub-County,Ward")
        );
        assert_eq!(
            lines.next(),
            Some("Amina,0711,34,Visual,White Cane,Kitui Central,Township")
        );
    }

    #[test]
    fn test_save_empty_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending.csv");
        CsvStore::new(&path).save(&[]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(CsvStore::new(&path).load().unwrap().is_empty());
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/registry.csv");
        let store = CsvStore::new(&path);

        store.save(&[amina()]).unwrap();
        assert!(path.exists());
        let names: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["registry.csv"]);
    }

    #[test]
    fn test_quoted_values_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("registry.csv"));
        let mut record = amina();
        record.name = "Mutua, \"Baba\" Ken".to_string();
        record.assistive_device = "Crutches\n(pair)".to_string();

        store.save(std::slice::from_ref(&record)).unwrap();
        assert_eq!(store.load().unwrap(), vec![record]);
    }

    #[test]
    fn test_read_maps_columns_by_name() {
        let text = "Ward,Name,Phone,Disability Type,Assistive Device,Sub-County,Age,identifier\n\
                    Township,Amina,0711,Visual,White Cane,Kitui Central,34,ignored\n";
        let records = CsvStore::read_from(text.as_bytes()).unwrap();
        assert_eq!(records, vec![amina()]);
    }

    #[test]
    fn test_read_missing_age_column_reads_blank() {
        let text = "Name,Phone,Disability Type,Assistive Device,Sub-County,Ward\n\
                    Amina,0711,Visual,White Cane,Kitui Central,Township\n";
        let records = CsvStore::read_from(text.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].age, "");
        assert_eq!(records[0].ward, "Township");
    }

    #[test]
    fn test_read_empty_input() {
        let records = CsvStore::read_from("".as_bytes()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_save_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("registry.csv"));
        store.save(&[amina(), john("John")]).unwrap();
        store.save(&[john("John K")]).unwrap();
        assert_eq!(store.load().unwrap(), vec![john("John K")]);
    }

    #[test]
    fn test_location() {
        let store = CsvStore::new("/srv/pwd/registry.csv");
        assert_eq!(store.location(), "/srv/pwd/registry.csv");
        assert_eq!(store.path(), Path::new("/srv/pwd/registry.csv"));
    }
}
