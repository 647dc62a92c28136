//! Pending Queue intake.
//!
//! Public submissions land here before review. Every pending row carries a
//! [`PendingId`]: a sequence number handed out when the row entered the queue
//! and never handed out again. The queue file keeps the Registry's columns,
//! so the numbers live in an [`IdLedger`] beside it. An identifier does not
//! change when other rows are added or removed, and once its row has left the
//! queue it matches nothing, which lets a reviewer act on exactly the row they
//! looked at.
//!
//! If the queue file no longer matches the ledger (it was edited by hand, or
//! a write was interrupted) every row is numbered afresh above the last number
//! issued. Identifiers shown before that point then go stale rather than
//! pointing at some other row.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::locations::LocationCatalog;
use crate::notify::{Notification, Notifier};
use crate::record::{Field, Record};
use crate::storage::{IdLedger, LedgerStore, SharedStore, StoreGuard};

/// Fields a public submission must fill in.
pub const SUBMISSION_REQUIRED: [Field; 6] = [
    Field::Name,
    Field::Phone,
    Field::DisabilityType,
    Field::AssistiveDevice,
    Field::SubCounty,
    Field::Ward,
];

/// Intake sequence number of a row in the Pending Queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PendingId(u64);

impl PendingId {
    /// The sequence number.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PendingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PendingId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let digits = s.strip_prefix('#').unwrap_or(s);
        match digits.parse::<u64>() {
            Ok(n) if n > 0 && digits.bytes().all(|b| b.is_ascii_digit()) => Ok(Self(n)),
            _ => Err(Error::validation(format!("malformed pending id '{s}'"))),
        }
    }
}

fn hash_records(records: &[Record]) -> blake3::Hasher {
    let mut hasher = blake3::Hasher::new();
    let len = u64::try_from(records.len()).unwrap_or(u64::MAX);
    hasher.update(&len.to_le_bytes());
    for record in records {
        record.feed(&mut hasher);
    }
    hasher
}

/// Digest of the queue contents alone, kept in the ledger.
fn content_digest(records: &[Record]) -> String {
    hash_records(records).finalize().to_hex().to_string()
}

/// Digest of a whole queue, used to detect that it changed between listing
/// and acting on a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    digest: String,
    len: usize,
}

impl QueueSnapshot {
    /// Capture the state of a queue: its rows and their identifiers.
    #[must_use]
    pub fn of(ids: &[PendingId], records: &[Record]) -> Self {
        let mut hasher = hash_records(records);
        for id in ids {
            hasher.update(&id.0.to_le_bytes());
        }
        Self {
            digest: hasher.finalize().to_hex().to_string(),
            len: records.len(),
        }
    }

    /// Number of rows at capture time.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the queue was empty at capture time.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The hex digest.
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

/// A row of the Pending Queue together with its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingEntry {
    /// Position in the queue when it was read.
    pub index: usize,
    /// Stable identifier.
    pub id: PendingId,
    /// The submitted record.
    pub record: Record,
}

/// One read of the Pending Queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingListing {
    /// Digest of the queue as read.
    pub snapshot: QueueSnapshot,
    /// Entries in file order.
    pub entries: Vec<PendingEntry>,
}

impl PendingListing {
    /// Number of pending entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no pending entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the entries in file order.
    pub fn iter(&self) -> std::slice::Iter<'_, PendingEntry> {
        self.entries.iter()
    }
}

impl IntoIterator for PendingListing {
    type Item = PendingEntry;
    type IntoIter = std::vec::IntoIter<PendingEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a PendingListing {
    type Item = &'a PendingEntry;
    type IntoIter = std::slice::Iter<'a, PendingEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// The queue rows and their identifiers, read under the queue lock.
#[derive(Debug)]
pub(crate) struct PendingRows {
    records: Vec<Record>,
    ids: Vec<PendingId>,
    last_issued: u64,
}

impl PendingRows {
    /// Pair `records` with the identifiers `ledger` holds for them.
    fn numbered(records: Vec<Record>, ledger: &IdLedger) -> Self {
        let matches = ledger.ids.len() == records.len()
            && ledger.queue_digest == content_digest(&records);
        let ids: Vec<PendingId> = if matches {
            ledger.ids.iter().copied().map(PendingId).collect()
        } else {
            if !records.is_empty() {
                warn!(
                    rows = records.len(),
                    from = ledger.last_issued + 1,
                    "Pending queue does not match its id ledger, numbering rows afresh"
                );
            }
            (ledger.last_issued + 1..)
                .take(records.len())
                .map(PendingId)
                .collect()
        };
        let last_issued = ids
            .iter()
            .map(|id| id.0)
            .fold(ledger.last_issued, u64::max);
        Self {
            records,
            ids,
            last_issued,
        }
    }

    fn ledger(&self) -> IdLedger {
        IdLedger {
            last_issued: self.last_issued,
            queue_digest: content_digest(&self.records),
            ids: self.ids.iter().map(|id| id.0).collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot::of(&self.ids, &self.records)
    }

    /// Current position of `id`.
    pub(crate) fn position(&self, id: PendingId) -> Option<usize> {
        self.ids.iter().position(|candidate| *candidate == id)
    }

    /// Take the row at `index` out of the queue.
    pub(crate) fn remove(&mut self, index: usize) -> (PendingId, Record) {
        (self.ids.remove(index), self.records.remove(index))
    }

    /// Append `record` under a newly issued identifier.
    fn push(&mut self, record: Record) -> PendingEntry {
        self.last_issued += 1;
        let id = PendingId(self.last_issued);
        self.ids.push(id);
        self.records.push(record.clone());
        PendingEntry {
            index: self.records.len() - 1,
            id,
            record,
        }
    }

    fn into_listing(self) -> PendingListing {
        let snapshot = self.snapshot();
        let entries = self
            .records
            .into_iter()
            .zip(self.ids)
            .enumerate()
            .map(|(index, (record, id))| PendingEntry { index, id, record })
            .collect();
        PendingListing { snapshot, entries }
    }
}

/// The intake store of unmoderated public submissions.
#[derive(Debug)]
pub struct PendingQueue {
    store: SharedStore,
    ledger: Box<dyn LedgerStore>,
    catalog: LocationCatalog,
}

impl PendingQueue {
    /// Create a queue over `store`, numbered by `ledger`, validating
    /// locations against `catalog`.
    #[must_use]
    pub fn new(
        store: SharedStore,
        ledger: impl LedgerStore + 'static,
        catalog: LocationCatalog,
    ) -> Self {
        Self {
            store,
            ledger: Box::new(ledger),
            catalog,
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Read the rows and their identifiers. `guard` must be this queue's lock.
    pub(crate) fn read(&self, guard: &StoreGuard<'_>) -> Result<PendingRows> {
        let ledger = self.ledger.load()?;
        let records = guard.load()?;
        Ok(PendingRows::numbered(records, &ledger))
    }

    /// Persist `rows`: the ledger first, then the queue file.
    ///
    /// If the queue write fails after the ledger was written, the next read
    /// sees a mismatch and renumbers above every number already issued.
    pub(crate) fn write(&self, guard: &StoreGuard<'_>, rows: &PendingRows) -> Result<()> {
        self.ledger.save(&rows.ledger())?;
        guard.save(&rows.records)
    }

    /// Validate and append a public submission.
    ///
    /// Every field is trimmed. All fields except Age are required, and the
    /// Ward must belong to the Sub-County. On failure nothing is written.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the blank fields or the bad location,
    /// or a storage error if the queue cannot be persisted.
    pub fn submit(&self, fields: &Record) -> Result<PendingEntry> {
        let record = fields.trimmed();

        let missing = record.missing(&SUBMISSION_REQUIRED);
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|f| f.column()).collect();
            return Err(Error::validation(format!(
                "required fields are blank: {}",
                names.join(", ")
            )));
        }
        self.catalog.check(&record.sub_county, &record.ward)?;

        let guard = self.store.lock();
        let mut rows = self.read(&guard)?;
        let entry = rows.push(record);
        self.write(&guard, &rows)?;

        info!(
            id = %entry.id,
            name = %entry.record.name,
            sub_county = %entry.record.sub_county,
            "Submission queued for review"
        );
        Ok(entry)
    }

    /// Read the queue afresh.
    ///
    /// Each call re-reads the file; nothing is cached between calls.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the queue cannot be read.
    pub fn list_pending(&self) -> Result<PendingListing> {
        let guard = self.store.lock();
        Ok(self.read(&guard)?.into_listing())
    }
}

/// Notify the operator about a committed submission.
///
/// The submission is already persisted when this runs; a failure here is
/// logged and returned for the caller to report as a warning.
///
/// # Errors
///
/// Returns the notifier's error.
pub async fn deliver_notification(
    notifier: &dyn Notifier,
    operator_address: &str,
    entry: &PendingEntry,
) -> Result<()> {
    let notification = Notification::for_submission(operator_address, &entry.record);
    let result = notifier.send(&notification).await;
    if let Err(e) = &result {
        warn!(id = %entry.id, channel = notifier.name(), error = %e, "Operator notification failed");
    }
    result
}
