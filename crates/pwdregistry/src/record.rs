//! Core record types for pwdregistry.
//!
//! This module defines the registry row shared by the Pending Queue and the
//! Registry, the field vocabulary used in validation messages, and the
//! identity concepts used to select rows for deletion and bulk edits.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Column header of both store files, in on-disk order.
pub const REGISTRY_COLUMNS: [&str; 7] = [
    "Name",
    "Phone",
    "Age",
    "Disability Type",
    "Assistive Device",
    "Sub-County",
    "Ward",
];

/// Separator used when hashing field values, never present in user input.
const FIELD_SEPARATOR: char = '\u{1f}';

/// A single field of a [`Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    /// Full name of the beneficiary.
    Name,
    /// Contact phone number.
    Phone,
    /// Age in years, kept as text.
    Age,
    /// Kind of disability.
    DisabilityType,
    /// Requested assistive device.
    AssistiveDevice,
    /// Administrative sub-county.
    SubCounty,
    /// Ward within the sub-county.
    Ward,
}

impl Field {
    /// All fields in on-disk column order.
    pub const ALL: [Field; 7] = [
        Field::Name,
        Field::Phone,
        Field::Age,
        Field::DisabilityType,
        Field::AssistiveDevice,
        Field::SubCounty,
        Field::Ward,
    ];

    /// The column header for this field.
    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Phone => "Phone",
            Self::Age => "Age",
            Self::DisabilityType => "Disability Type",
            Self::AssistiveDevice => "Assistive Device",
            Self::SubCounty => "Sub-County",
            Self::Ward => "Ward",
        }
    }

    /// Look up a field by its column header.
    #[must_use]
    pub fn from_column(column: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.column() == column.trim())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// One person's registry entry.
///
/// The same shape is used for rows waiting in the Pending Queue and rows in
/// the Registry. Every value is kept as text so files written by other tools
/// read back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    /// Full name.
    #[serde(rename = "Name", default)]
    pub name: String,
    /// Phone number, the de facto identity key for bulk edits.
    #[serde(rename = "Phone", default)]
    pub phone: String,
    /// Age in years (may be blank).
    #[serde(rename = "Age", default)]
    pub age: String,
    /// Kind of disability.
    #[serde(rename = "Disability Type", default)]
    pub disability_type: String,
    /// Requested assistive device.
    #[serde(rename = "Assistive Device", default)]
    pub assistive_device: String,
    /// Administrative sub-county.
    #[serde(rename = "Sub-County", default)]
    pub sub_county: String,
    /// Ward within the sub-county.
    #[serde(rename = "Ward", default)]
    pub ward: String,
}

impl Record {
    /// Get the value of a single field.
    #[must_use]
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Name => &self.name,
            Field::Phone => &self.phone,
            Field::Age => &self.age,
            Field::DisabilityType => &self.disability_type,
            Field::AssistiveDevice => &self.assistive_device,
            Field::SubCounty => &self.sub_county,
            Field::Ward => &self.ward,
        }
    }

    /// Set the value of a single field.
    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let slot = match field {
            Field::Name => &mut self.name,
            Field::Phone => &mut self.phone,
            Field::Age => &mut self.age,
            Field::DisabilityType => &mut self.disability_type,
            Field::AssistiveDevice => &mut self.assistive_device,
            Field::SubCounty => &mut self.sub_county,
            Field::Ward => &mut self.ward,
        };
        *slot = value.into();
    }

    /// Return a copy with surrounding whitespace stripped from every field.
    #[must_use]
    pub fn trimmed(&self) -> Self {
        let mut out = Self::default();
        for field in Field::ALL {
            out.set(field, self.get(field).trim());
        }
        out
    }

    /// List the fields among `required` that are blank after trimming.
    #[must_use]
    pub fn missing(&self, required: &[Field]) -> Vec<Field> {
        required
            .iter()
            .copied()
            .filter(|f| self.get(*f).trim().is_empty())
            .collect()
    }

    /// The composite selection label: `Name (Phone | Sub-County - Ward)`.
    ///
    /// Computed on demand and never written to disk.
    #[must_use]
    pub fn identifier(&self) -> String {
        format!(
            "{} ({} | {} - {})",
            self.name, self.phone, self.sub_county, self.ward
        )
    }

    /// Feed every field value into `hasher`, separated so that field
    /// boundaries are unambiguous.
    pub(crate) fn feed(&self, hasher: &mut blake3::Hasher) {
        for field in Field::ALL {
            hasher.update(self.get(field).as_bytes());
            let mut buf = [0u8; 4];
            hasher.update(FIELD_SEPARATOR.encode_utf8(&mut buf).as_bytes());
        }
    }
}

/// How a single Registry row is chosen for deletion.
///
/// Both variants resolve to the first row in file order that matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberSelector {
    /// Exact match on the Name field.
    Name(String),
    /// Exact match on the composite label from [`Record::identifier`].
    Identifier(String),
}

impl MemberSelector {
    /// Check whether `record` is selected.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::Name(name) => record.name == *name,
            Self::Identifier(label) => record.identifier() == *label,
        }
    }
}

impl fmt::Display for MemberSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "member named '{name}'"),
            Self::Identifier(label) => write!(f, "member '{label}'"),
        }
    }
}

/// The phone number that keys a bulk edit.
///
/// Captured from the member being edited before any change is made, so every
/// row that shared the old number is updated even when the number itself
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhoneKey(String);

impl PhoneKey {
    /// Key on an explicit phone number.
    #[must_use]
    pub fn new(phone: impl AsRef<str>) -> Self {
        Self(phone.as_ref().trim().to_string())
    }

    /// Key on the current phone number of `record`.
    #[must_use]
    pub fn of(record: &Record) -> Self {
        Self::new(&record.phone)
    }

    /// The phone number as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether `record` carries this phone number, ignoring
    /// surrounding whitespace left by uploads and older files.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        record.phone.trim() == self.0
    }
}

impl fmt::Display for PhoneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
