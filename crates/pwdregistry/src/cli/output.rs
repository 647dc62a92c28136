//! Text rendering for command output.

use std::fmt::Write as _;

use tabled::{Table, Tabled};

use crate::intake::{PendingId, PendingListing};
use crate::record::Record;
use crate::report::Summary;
use crate::storage::Backup;

/// One Registry row as shown in tables.
#[derive(Debug, Tabled)]
struct RecordRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Phone")]
    phone: String,
    #[tabled(rename = "Age")]
    age: String,
    #[tabled(rename = "Disability Type")]
    disability_type: String,
    #[tabled(rename = "Assistive Device")]
    assistive_device: String,
    #[tabled(rename = "Sub-County")]
    sub_county: String,
    #[tabled(rename = "Ward")]
    ward: String,
}

impl From<&Record> for RecordRow {
    fn from(record: &Record) -> Self {
        Self {
            name: record.name.clone(),
            phone: record.phone.clone(),
            age: record.age.clone(),
            disability_type: record.disability_type.clone(),
            assistive_device: record.assistive_device.clone(),
            sub_county: record.sub_county.clone(),
            ward: record.ward.clone(),
        }
    }
}

/// A Pending Queue entry as shown in tables.
#[derive(Debug, Tabled)]
struct PendingRow {
    #[tabled(rename = "ID")]
    id: PendingId,
    #[tabled(inline)]
    record: RecordRow,
}

/// Member count of one sub-county.
#[derive(Debug, Tabled)]
struct SubCountyRow<'a> {
    #[tabled(rename = "Sub-County")]
    sub_county: &'a str,
    #[tabled(rename = "Members")]
    members: usize,
}

fn render<T: Tabled>(rows: Vec<T>) -> String {
    let mut out = Table::new(rows).to_string();
    out.push('\n');
    out
}

/// Render records as a table with the Registry columns.
#[must_use]
pub fn records_table<'a>(records: impl IntoIterator<Item = &'a Record>) -> String {
    render(records.into_iter().map(RecordRow::from).collect())
}

/// Render records one composite label per line.
#[must_use]
pub fn records_plain<'a>(records: impl IntoIterator<Item = &'a Record>) -> String {
    records
        .into_iter()
        .fold(String::new(), |mut out, record| {
            let _ = writeln!(out, "{}", record.identifier());
            out
        })
}

/// Render the Pending Queue with ids in front.
#[must_use]
pub fn pending_table(listing: &PendingListing) -> String {
    render(
        listing
            .iter()
            .map(|entry| PendingRow {
                id: entry.id,
                record: RecordRow::from(&entry.record),
            })
            .collect(),
    )
}

/// Render the Pending Queue one entry per line.
#[must_use]
pub fn pending_plain(listing: &PendingListing) -> String {
    listing.iter().fold(String::new(), |mut out, entry| {
        let _ = writeln!(
            out,
            "{}  {} requests {}",
            entry.id,
            entry.record.identifier(),
            entry.record.assistive_device
        );
        out
    })
}

/// Render a summary block.
#[must_use]
pub fn summary_text(summary: &Summary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Total members:         {}", summary.total);
    let _ = writeln!(out, "Sub-counties covered:  {}", summary.unique_sub_counties);
    let _ = writeln!(
        out,
        "Most requested device: {}",
        summary.most_requested_device.as_deref().unwrap_or("-")
    );
    if !summary.by_sub_county.is_empty() {
        out.push('\n');
        let rows: Vec<SubCountyRow<'_>> = summary
            .by_sub_county
            .iter()
            .map(|(name, count)| SubCountyRow {
                sub_county: name,
                members: *count,
            })
            .collect();
        out.push_str(&render(rows));
    }
    out
}

/// Render a list of backups.
#[must_use]
pub fn backups_plain(backups: &[Backup]) -> String {
    backups.iter().fold(String::new(), |mut out, backup| {
        let _ = writeln!(
            out,
            "{}  {}",
            backup.taken_at.format("%Y-%m-%d %H:%M:%S"),
            backup.path.display()
        );
        out
    })
}
