//! Read-only views over the Registry: filtering, name search and summary
//! statistics.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::record::{Field, Record};

/// Membership filter over four fields.
///
/// An empty set places no constraint on its field; non-empty sets must all
/// contain the record's value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordFilter {
    /// Accepted Sub-County values.
    pub sub_counties: BTreeSet<String>,
    /// Accepted Ward values.
    pub wards: BTreeSet<String>,
    /// Accepted Disability Type values.
    pub disabilities: BTreeSet<String>,
    /// Accepted Assistive Device values.
    pub devices: BTreeSet<String>,
}

impl RecordFilter {
    /// Whether no set constrains anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sub_counties.is_empty()
            && self.wards.is_empty()
            && self.disabilities.is_empty()
            && self.devices.is_empty()
    }

    /// Check a single record.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        accepts(&self.sub_counties, &record.sub_county)
            && accepts(&self.wards, &record.ward)
            && accepts(&self.disabilities, &record.disability_type)
            && accepts(&self.devices, &record.assistive_device)
    }

    /// Records that pass the filter, in their original order.
    #[must_use]
    pub fn apply<'a>(&self, records: &'a [Record]) -> Vec<&'a Record> {
        records.iter().filter(|r| self.matches(r)).collect()
    }

    /// Ward values to offer, limited to the selected sub-counties.
    #[must_use]
    pub fn ward_options(&self, records: &[Record]) -> Vec<String> {
        let wards: BTreeSet<&str> = records
            .iter()
            .filter(|r| accepts(&self.sub_counties, &r.sub_county))
            .map(|r| r.ward.as_str())
            .filter(|w| !w.is_empty())
            .collect();
        wards.into_iter().map(ToString::to_string).collect()
    }
}

fn accepts(set: &BTreeSet<String>, value: &str) -> bool {
    set.is_empty() || set.contains(value)
}

/// Distinct non-blank values of `field`, sorted.
#[must_use]
pub fn options(records: &[Record], field: Field) -> Vec<String> {
    let values: BTreeSet<&str> = records
        .iter()
        .map(|r| r.get(field))
        .filter(|v| !v.is_empty())
        .collect();
    values.into_iter().map(ToString::to_string).collect()
}

/// Records whose name contains `query`, ignoring case.
///
/// A blank query matches nothing.
#[must_use]
pub fn search_by_name<'a>(records: &'a [Record], query: &str) -> Vec<&'a Record> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }
    records
        .iter()
        .filter(|r| r.name.to_lowercase().contains(&query))
        .collect()
}

/// Headline numbers for a set of records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Number of records.
    pub total: usize,
    /// Number of distinct non-blank sub-counties.
    pub unique_sub_counties: usize,
    /// Most frequent Assistive Device; ties go to the alphabetically first.
    pub most_requested_device: Option<String>,
    /// Record count per sub-county, largest first, then by name.
    pub by_sub_county: Vec<(String, usize)>,
}

impl Summary {
    /// Compute the summary of `records`.
    #[must_use]
    pub fn of<'a>(records: impl IntoIterator<Item = &'a Record>) -> Self {
        let mut total = 0;
        let mut sub_counties: BTreeMap<&str, usize> = BTreeMap::new();
        let mut devices: BTreeMap<&str, usize> = BTreeMap::new();

        for record in records {
            total += 1;
            if !record.sub_county.is_empty() {
                *sub_counties.entry(&record.sub_county).or_default() += 1;
            }
            if !record.assistive_device.is_empty() {
                *devices.entry(&record.assistive_device).or_default() += 1;
            }
        }

        // BTreeMap iterates alphabetically, so keeping only strictly larger
        // counts leaves the alphabetically first device on ties.
        let mut most_requested_device: Option<(&str, usize)> = None;
        for (device, count) in devices {
            if most_requested_device.map_or(true, |(_, best)| count > best) {
                most_requested_device = Some((device, count));
            }
        }

        let mut by_sub_county: Vec<(String, usize)> = sub_counties
            .iter()
            .map(|(name, count)| ((*name).to_string(), *count))
            .collect();
        by_sub_county.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Self {
            total,
            unique_sub_counties: sub_counties.len(),
            most_requested_device: most_requested_device.map(|(d, _)| d.to_string()),
            by_sub_county,
        }
    }
}
