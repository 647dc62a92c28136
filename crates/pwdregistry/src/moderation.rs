//! Moderation of pending submissions.
//!
//! Every pending entry is in exactly one of three states: still in the queue
//! (pending), copied into the Registry and removed from the queue (promoted),
//! or removed from the queue only (discarded). Promotion and discard are
//! terminal; once an entry has left the queue any further decision on it
//! fails with a stale-entry error instead of touching some other row.
//!
//! Promotion writes two files. The Registry is written first and the queue
//! second, so an interruption between the two leaves the record in both
//! stores rather than in neither. The queue lock is always taken before the
//! Registry lock.

use serde::Serialize;
use tracing::{error, info};

use crate::access::AdminToken;
use crate::error::{Error, Result};
use crate::intake::{PendingId, PendingQueue, PendingRows, QueueSnapshot};
use crate::record::Record;
use crate::registry::Registry;
use crate::storage::StoreGuard;

/// Terminal decision taken on a pending entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Copied into the Registry, then removed from the queue.
    Promoted,
    /// Removed from the queue without copying.
    Discarded,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Promoted => write!(f, "promoted"),
            Self::Discarded => write!(f, "discarded"),
        }
    }
}

/// Result of a moderation decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModerationOutcome {
    /// The decision that was applied.
    pub decision: Decision,
    /// Identifier the entry had while pending.
    pub id: PendingId,
    /// The record that left the queue.
    pub record: Record,
}

/// Applies review decisions to the Pending Queue.
#[derive(Debug)]
pub struct Moderator<'a> {
    queue: &'a PendingQueue,
    registry: &'a Registry,
}

impl<'a> Moderator<'a> {
    /// Create a moderator over a queue and the Registry it promotes into.
    #[must_use]
    pub fn new(queue: &'a PendingQueue, registry: &'a Registry) -> Self {
        Self { queue, registry }
    }

    /// Promote the entry identified by `id` into the Registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleEntry`] if no entry with `id` is pending, or a
    /// storage error if either file cannot be read or written.
    pub fn approve(&self, _token: &AdminToken, id: &PendingId) -> Result<ModerationOutcome> {
        let queue = self.queue.store().lock();
        let registry = self.registry.store().lock();

        let pending = self.queue.read(&queue)?;
        let index = pending.position(*id).ok_or_else(|| missing(*id))?;
        self.promote(&queue, &registry, pending, index)
    }

    /// Discard the entry identified by `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleEntry`] if no entry with `id` is pending, or a
    /// storage error if the queue cannot be read or written.
    pub fn reject(&self, _token: &AdminToken, id: &PendingId) -> Result<ModerationOutcome> {
        let queue = self.queue.store().lock();

        let pending = self.queue.read(&queue)?;
        let index = pending.position(*id).ok_or_else(|| missing(*id))?;
        self.discard(&queue, pending, index)
    }

    /// Promote the entry at `index` of the queue as it was when `snapshot`
    /// was taken.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleEntry`] if the queue changed since `snapshot` or
    /// `index` is out of range, or a storage error.
    pub fn approve_at(
        &self,
        _token: &AdminToken,
        snapshot: &QueueSnapshot,
        index: usize,
    ) -> Result<ModerationOutcome> {
        let queue = self.queue.store().lock();
        let registry = self.registry.store().lock();

        let pending = self.queue.read(&queue)?;
        check_position(&pending, snapshot, index)?;
        self.promote(&queue, &registry, pending, index)
    }

    /// Discard the entry at `index` of the queue as it was when `snapshot`
    /// was taken.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleEntry`] if the queue changed since `snapshot` or
    /// `index` is out of range, or a storage error.
    pub fn reject_at(
        &self,
        _token: &AdminToken,
        snapshot: &QueueSnapshot,
        index: usize,
    ) -> Result<ModerationOutcome> {
        let queue = self.queue.store().lock();

        let pending = self.queue.read(&queue)?;
        check_position(&pending, snapshot, index)?;
        self.discard(&queue, pending, index)
    }

    fn promote(
        &self,
        queue: &StoreGuard<'_>,
        registry: &StoreGuard<'_>,
        mut pending: PendingRows,
        index: usize,
    ) -> Result<ModerationOutcome> {
        let (id, record) = pending.remove(index);

        let mut members = registry.load()?;
        members.push(record.clone());
        registry.save(&members)?;

        if let Err(e) = self.queue.write(queue, &pending) {
            error!(
                id = %id,
                name = %record.name,
                error = %e,
                "Record added to Registry but still pending; it will appear in both"
            );
            return Err(e);
        }

        info!(id = %id, name = %record.name, "Approved and added to the Registry");
        Ok(ModerationOutcome {
            decision: Decision::Promoted,
            id,
            record,
        })
    }

    fn discard(
        &self,
        queue: &StoreGuard<'_>,
        mut pending: PendingRows,
        index: usize,
    ) -> Result<ModerationOutcome> {
        let (id, record) = pending.remove(index);
        self.queue.write(queue, &pending)?;

        info!(id = %id, name = %record.name, "Rejected and removed from the queue");
        Ok(ModerationOutcome {
            decision: Decision::Discarded,
            id,
            record,
        })
    }
}

fn missing(id: PendingId) -> Error {
    Error::stale(format!("pending entry {id} is no longer in the queue"))
}

fn check_position(pending: &PendingRows, snapshot: &QueueSnapshot, index: usize) -> Result<()> {
    if pending.snapshot() != *snapshot {
        return Err(Error::stale(
            "the pending queue changed since it was listed",
        ));
    }
    if index >= pending.len() {
        return Err(Error::stale(format!(
            "index {index} is out of range for {} pending entries",
            pending.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::tests::admin;
    use crate::locations::LocationCatalog;
    use crate::record::tests::amina;
    use crate::storage::{MemoryLedger, MemoryStore, SharedStore};

    struct Fixture {
        queue: PendingQueue,
        registry: Registry,
    }

    impl Fixture {
        fn new(pending: Vec<Record>, members: Vec<Record>) -> Self {
            Self {
                queue: PendingQueue::new(
                    SharedStore::new(MemoryStore::with_records(pending)),
                    MemoryLedger::default(),
                    LocationCatalog::default(),
                ),
                registry: Registry::new(
                    SharedStore::new(MemoryStore::with_records(members)),
                    LocationCatalog::default(),
                ),
            }
        }

        fn moderator(&self) -> Moderator<'_> {
            Moderator::new(&self.queue, &self.registry)
        }

        fn pending(&self) -> Vec<Record> {
            self.queue.store().load().unwrap()
        }

        fn members(&self) -> Vec<Record> {
            self.registry.list().unwrap()
        }
    }

    fn mwende() -> Record {
        Record {
            name: "Mwende".to_string(),
            phone: "0744".to_string(),
            age: "12".to_string(),
            disability_type: "Physical".to_string(),
            assistive_device: "Wheelchair".to_string(),
            sub_county: "Kitui South".to_string(),
            ward: "Mutomo".to_string(),
        }
    }

    #[test]
    fn test_approve_single_entry() {
        let fx = Fixture::new(vec![amina()], Vec::new());
        let id = fx.queue.list_pending().unwrap().entries[0].id;

        let outcome = fx.moderator().approve(&admin(), &id).unwrap();
        assert_eq!(outcome.decision, Decision::Promoted);
        assert_eq!(outcome.record, amina());
        assert_eq!(fx.members(), vec![amina()]);
        assert!(fx.pending().is_empty());
    }

    #[test]
    fn test_approve_changes_lengths_by_one() {
        let fx = Fixture::new(vec![amina(), mwende()], vec![mwende()]);
        let listing = fx.queue.list_pending().unwrap();
        let target = &listing.entries[1];

        let outcome = fx.moderator().approve(&admin(), &target.id).unwrap();
        assert_eq!(fx.members().len(), 2);
        assert_eq!(fx.pending(), vec![amina()]);
        assert_eq!(fx.members().last(), Some(&outcome.record));
        assert_eq!(outcome.record, target.record);
    }

    #[test]
    fn test_reject_leaves_registry_untouched() {
        let fx = Fixture::new(vec![amina(), mwende()], vec![mwende()]);
        let id = fx.queue.list_pending().unwrap().entries[0].id;

        let outcome = fx.moderator().reject(&admin(), &id).unwrap();
        assert_eq!(outcome.decision, Decision::Discarded);
        assert_eq!(outcome.record, amina());
        assert_eq!(fx.members(), vec![mwende()]);
        assert_eq!(fx.pending(), vec![mwende()]);
    }

    #[test]
    fn test_second_decision_on_same_entry_is_stale() {
        let fx = Fixture::new(vec![amina(), mwende()], Vec::new());
        let id = fx.queue.list_pending().unwrap().entries[0].id;

        fx.moderator().approve(&admin(), &id).unwrap();
        let err = fx.moderator().reject(&admin(), &id).unwrap_err();
        assert!(err.is_stale());
        let err = fx.moderator().approve(&admin(), &id).unwrap_err();
        assert!(err.is_stale());

        assert_eq!(fx.pending(), vec![mwende()]);
        assert_eq!(fx.members(), vec![amina()]);
    }

    #[test]
    fn test_id_survives_queue_shift() {
        let fx = Fixture::new(vec![amina(), mwende()], Vec::new());
        let listing = fx.queue.list_pending().unwrap();
        let first = listing.entries[0].id;
        let second = listing.entries[1].id;

        // Another reviewer removes the first row
        fx.moderator().reject(&admin(), &first).unwrap();

        // The second row moved to index 0 but its id still finds it
        let outcome = fx.moderator().approve(&admin(), &second).unwrap();
        assert_eq!(outcome.record, mwende());
        assert_eq!(fx.members(), vec![mwende()]);
    }

    #[test]
    fn test_duplicate_pending_rows_removed_one_at_a_time() {
        let fx = Fixture::new(vec![amina(), amina()], Vec::new());
        let ids: Vec<_> = fx
            .queue
            .list_pending()
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();

        fx.moderator().approve(&admin(), &ids[0]).unwrap();
        assert_eq!(fx.pending(), vec![amina()]);
        assert_eq!(fx.members(), vec![amina()]);
    }

    #[test]
    fn test_repeat_decision_on_duplicate_rows_is_stale() {
        let fx = Fixture::new(vec![amina(), amina()], Vec::new());
        let listing = fx.queue.list_pending().unwrap();
        let (first, second) = (listing.entries[0].id, listing.entries[1].id);

        fx.moderator().approve(&admin(), &first).unwrap();

        // The surviving duplicate keeps its own id; the spent one matches nothing
        assert!(fx.moderator().approve(&admin(), &first).unwrap_err().is_stale());
        assert!(fx.moderator().reject(&admin(), &first).unwrap_err().is_stale());
        assert_eq!(fx.pending(), vec![amina()]);
        assert_eq!(fx.members(), vec![amina()]);
        assert_eq!(fx.queue.list_pending().unwrap().entries[0].id, second);
    }

    #[test]
    fn test_resubmission_after_reject_is_a_new_entry() {
        let fx = Fixture::new(Vec::new(), Vec::new());
        let rejected = fx.queue.submit(&amina()).unwrap().id;
        fx.moderator().reject(&admin(), &rejected).unwrap();

        let resubmitted = fx.queue.submit(&amina()).unwrap().id;
        assert_ne!(resubmitted, rejected);

        let err = fx.moderator().approve(&admin(), &rejected).unwrap_err();
        assert!(err.is_stale());
        assert!(fx.members().is_empty());
        assert_eq!(fx.pending(), vec![amina()]);
    }

    #[test]
    fn test_positional_snapshot_sees_resubmission() {
        let fx = Fixture::new(Vec::new(), Vec::new());
        fx.queue.submit(&amina()).unwrap();
        let listing = fx.queue.list_pending().unwrap();
        fx.moderator()
            .reject_at(&admin(), &listing.snapshot, 0)
            .unwrap();
        fx.queue.submit(&amina()).unwrap();

        // Same content, different entry
        let err = fx
            .moderator()
            .approve_at(&admin(), &listing.snapshot, 0)
            .unwrap_err();
        assert!(err.is_stale());
        assert!(fx.members().is_empty());
    }

    #[test]
    fn test_positional_approve_with_fresh_snapshot() {
        let fx = Fixture::new(vec![amina(), mwende()], Vec::new());
        let listing = fx.queue.list_pending().unwrap();

        let outcome = fx
            .moderator()
            .approve_at(&admin(), &listing.snapshot, 1)
            .unwrap();
        assert_eq!(outcome.record, mwende());
        assert_eq!(outcome.id, listing.entries[1].id);
        assert_eq!(fx.pending(), vec![amina()]);
    }

    #[test]
    fn test_positional_decision_with_stale_snapshot_fails() {
        let fx = Fixture::new(vec![amina(), mwende()], Vec::new());
        let listing = fx.queue.list_pending().unwrap();

        fx.moderator()
            .reject_at(&admin(), &listing.snapshot, 0)
            .unwrap();

        // Index 0 now refers to a different record; the old snapshot must not act on it
        let err = fx
            .moderator()
            .approve_at(&admin(), &listing.snapshot, 0)
            .unwrap_err();
        assert!(err.is_stale());
        assert_eq!(fx.pending(), vec![mwende()]);
        assert!(fx.members().is_empty());
    }

    #[test]
    fn test_positional_index_out_of_range() {
        let fx = Fixture::new(vec![amina()], Vec::new());
        let listing = fx.queue.list_pending().unwrap();
        let err = fx
            .moderator()
            .reject_at(&admin(), &listing.snapshot, 3)
            .unwrap_err();
        assert!(err.is_stale());
        assert_eq!(fx.pending(), vec![amina()]);
    }

    #[test]
    fn test_decision_display() {
        assert_eq!(Decision::Promoted.to_string(), "promoted");
        assert_eq!(Decision::Discarded.to_string(), "discarded");
    }
}
