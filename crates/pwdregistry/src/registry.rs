//! Registry maintenance.
//!
//! The Registry is the authoritative list of approved beneficiaries. Rows have
//! no key column: deletion selects the first row matching a [`MemberSelector`]
//! and bulk edits select every row sharing a phone number.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::access::AdminToken;
use crate::error::{Error, Result};
use crate::locations::LocationCatalog;
use crate::record::{Field, MemberSelector, PhoneKey, Record};
use crate::storage::SharedStore;

/// Fields an administrator must fill in when adding a member directly.
pub const ADD_REQUIRED: [Field; 4] = [
    Field::Name,
    Field::DisabilityType,
    Field::AssistiveDevice,
    Field::SubCounty,
];

/// New values for the editable fields of a member.
///
/// Disability Type and Assistive Device are not editable and are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberUpdate {
    /// New name.
    pub name: String,
    /// New phone number.
    pub phone: String,
    /// New age.
    pub age: String,
    /// New sub-county.
    pub sub_county: String,
    /// New ward.
    pub ward: String,
}

impl MemberUpdate {
    /// Start from the current values of `record`.
    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        Self {
            name: record.name.clone(),
            phone: record.phone.clone(),
            age: record.age.clone(),
            sub_county: record.sub_county.clone(),
            ward: record.ward.clone(),
        }
    }

    fn apply(&self, record: &mut Record) {
        record.name = self.name.trim().to_string();
        record.phone = self.phone.trim().to_string();
        record.age = self.age.trim().to_string();
        record.sub_county = self.sub_county.trim().to_string();
        record.ward = self.ward.trim().to_string();
    }
}

/// The authoritative store of approved records.
#[derive(Debug)]
pub struct Registry {
    store: SharedStore,
    catalog: LocationCatalog,
}

impl Registry {
    /// Create a Registry over `store`.
    #[must_use]
    pub fn new(store: SharedStore, catalog: LocationCatalog) -> Self {
        Self { store, catalog }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Read every member in file order.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the Registry cannot be read.
    pub fn list(&self) -> Result<Vec<Record>> {
        self.store.load()
    }

    /// Find the first member whose composite label equals `label`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no member has that label.
    pub fn find_by_identifier(&self, label: &str) -> Result<Record> {
        let selector = MemberSelector::Identifier(label.trim().to_string());
        self.list()?
            .into_iter()
            .find(|r| selector.matches(r))
            .ok_or_else(|| Error::not_found(selector.to_string()))
    }

    /// Append a member directly, bypassing the Pending Queue.
    ///
    /// Locations outside the catalog are accepted with a warning so legacy
    /// data can still be entered.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a required field is blank, or a storage
    /// error.
    pub fn add_member(&self, fields: &Record) -> Result<Record> {
        let record = fields.trimmed();

        let missing = record.missing(&ADD_REQUIRED);
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|f| f.column()).collect();
            return Err(Error::validation(format!(
                "required fields are blank: {}",
                names.join(", ")
            )));
        }
        if let Err(e) = self.catalog.check(&record.sub_county, &record.ward) {
            warn!(name = %record.name, "Adding member outside the location catalog: {e}");
        }

        self.store.update(|records| {
            records.push(record.clone());
            Ok(((), true))
        })?;

        info!(name = %record.name, sub_county = %record.sub_county, "Member added");
        Ok(record)
    }

    /// Remove the first member matched by `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if nothing matches; the Registry is not
    /// rewritten in that case.
    pub fn delete_member(&self, _token: &AdminToken, selector: &MemberSelector) -> Result<Record> {
        let removed = self.store.update(|records| {
            let index = records
                .iter()
                .position(|r| selector.matches(r))
                .ok_or_else(|| Error::not_found(selector.to_string()))?;
            Ok((records.remove(index), true))
        })?;

        info!(name = %removed.name, phone = %removed.phone, "Member deleted");
        Ok(removed)
    }

    /// Overwrite the editable fields of every member whose phone matches
    /// `key`.
    ///
    /// Returns the number of rows changed. No match is not an error and
    /// writes nothing. A location outside the catalog is accepted with a
    /// warning, as in [`Registry::add_member`].
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub fn update_member(
        &self,
        _token: &AdminToken,
        key: &PhoneKey,
        update: &MemberUpdate,
    ) -> Result<usize> {
        if let Err(e) = self.catalog.check(update.sub_county.trim(), update.ward.trim()) {
            warn!(phone = %key, "Updating members outside the location catalog: {e}");
        }

        let count = self.store.update(|records| {
            let mut count = 0;
            for record in records.iter_mut().filter(|r| key.matches(r)) {
                update.apply(record);
                count += 1;
            }
            Ok((count, count > 0))
        })?;

        if count == 0 {
            info!(phone = %key, "No members with that phone, nothing updated");
        } else {
            info!(phone = %key, count, "Members updated");
        }
        Ok(count)
    }
}
