//! Sub-County and Ward catalog.
//!
//! Public submissions must name a Sub-County from the catalog and a Ward that
//! belongs to it. Admin maintenance paths only warn about pairs outside the
//! catalog.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Mapping of Sub-County to the Wards it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationCatalog {
    sub_counties: BTreeMap<String, Vec<String>>,
}

impl LocationCatalog {
    /// Build a catalog from an explicit mapping.
    #[must_use]
    pub fn new(sub_counties: BTreeMap<String, Vec<String>>) -> Self {
        Self { sub_counties }
    }

    /// All Sub-Counties, sorted.
    pub fn sub_counties(&self) -> impl Iterator<Item = &str> {
        self.sub_counties.keys().map(String::as_str)
    }

    /// The Wards of `sub_county`, or `None` if it is not in the catalog.
    #[must_use]
    pub fn wards(&self, sub_county: &str) -> Option<&[String]> {
        self.sub_counties.get(sub_county).map(Vec::as_slice)
    }

    /// Check whether `ward` belongs to `sub_county`.
    #[must_use]
    pub fn contains(&self, sub_county: &str, ward: &str) -> bool {
        self.wards(sub_county)
            .is_some_and(|wards| wards.iter().any(|w| w == ward))
    }

    /// Validate a Sub-County/Ward pair.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the unknown Sub-County, or the Ward
    /// that does not belong to it.
    pub fn check(&self, sub_county: &str, ward: &str) -> Result<()> {
        let Some(wards) = self.wards(sub_county) else {
            return Err(Error::validation(format!(
                "unknown Sub-County '{sub_county}'"
            )));
        };
        if wards.iter().any(|w| w == ward) {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "Ward '{ward}' does not belong to Sub-County '{sub_county}'"
            )))
        }
    }
}

impl Default for LocationCatalog {
    fn default() -> Self {
        Self::new(default_locations())
    }
}

/// Kitui County Sub-Counties and their Wards.
#[must_use]
pub fn default_locations() -> BTreeMap<String, Vec<String>> {
    let table: [(&str, &[&str]); 8] = [
        (
            "Kitui Central",
            &[
                "Miambani",
                "Township",
                "Kyangwithya West",
                "Mulango",
                "Kyangwithya East",
            ],
        ),
        (
            "Kitui West",
            &["Mutonguni", "Kauwi", "Matinyani", "Kwa Mutonga/Kithumula"],
        ),
        (
            "Kitui Rural",
            &["Kisasi", "Mbitini", "Kwavonza/Yatta", "Kanyangi"],
        ),
        (
            "Kitui South",
            &[
                "Ikanga/Kyatune",
                "Mutomo",
                "Mutha",
                "Ikutha",
                "Kanziko",
                "Athi",
            ],
        ),
        (
            "Kitui East",
            &[
                "Zombe/Mwitika",
                "Nzambani",
                "Chuluni",
                "Voo/Nyanyaa",
                "Mutitu",
                "Endau/Malalani",
            ],
        ),
        (
            "Mwingi Central",
            &["Central", "Kivou", "Nguni", "Nuu", "Mui", "Waita"],
        ),
        (
            "Mwingi West",
            &["Kyome/Thaana", "Nguutani", "Migwani", "Kiomo/Kyethani"],
        ),
        (
            "Mwingi North",
            &["Ngomeni", "Kyuso", "Mumoni", "Tseikuru", "Tharaka"],
        ),
    ];

    table
        .into_iter()
        .map(|(sub_county, wards)| {
            (
                sub_county.to_string(),
                wards.iter().map(ToString::to_string).collect(),
            )
        })
        .collect()
}
