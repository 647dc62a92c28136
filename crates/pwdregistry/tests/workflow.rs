//! End-to-end workflow tests over real CSV files.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::thread;

use pwdregistry::config::StorageConfig;
use pwdregistry::{
    AccessGate, AdminToken, Config, CsvStore, Decision, MemberSelector, MemberUpdate, Moderator,
    PendingQueue, PhoneKey, Record, Registry,
};
use pwdregistry::storage::{Backups, RecordStore};
use tempfile::TempDir;

struct Workspace {
    _dir: TempDir,
    config: Config,
    queue: PendingQueue,
    registry: Registry,
    backups: Backups,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            storage: StorageConfig {
                registry_path: Some(dir.path().join("PWD_Disability_Set.csv")),
                pending_path: Some(dir.path().join("pending_requests.csv")),
                backup_dir: Some(dir.path().join("backups")),
            },
            ..Config::default()
        };
        let (queue, registry, backups) = pwdregistry::open(&config).unwrap();
        Self {
            _dir: dir,
            config,
            queue,
            registry,
            backups,
        }
    }

    fn admin(&self) -> AdminToken {
        AccessGate::from_config(&self.config)
            .grant("kitui123")
            .unwrap()
    }

    fn moderator(&self) -> Moderator<'_> {
        Moderator::new(&self.queue, &self.registry)
    }

    fn registry_file(&self) -> String {
        fs::read_to_string(self.config.registry_path()).unwrap()
    }
}

fn amina() -> Record {
    Record {
        name: "Amina".to_string(),
        phone: "0711".to_string(),
        age: "34".to_string(),
        disability_type: "Visual".to_string(),
        assistive_device: "White Cane".to_string(),
        sub_county: "Kitui Central".to_string(),
        ward: "Township".to_string(),
    }
}

fn john(name: &str, device: &str) -> Record {
    Record {
        name: name.to_string(),
        phone: "0722".to_string(),
        age: "38".to_string(),
        disability_type: "Physical".to_string(),
        assistive_device: device.to_string(),
        sub_county: "Kitui Rural".to_string(),
        ward: "Mbitini".to_string(),
    }
}

fn seed(path: &Path, records: &[Record]) {
    CsvStore::new(path).save(records).unwrap();
}

#[test]
fn test_approving_the_only_submission_moves_it_to_the_registry() {
    let ws = Workspace::new();
    let entry = ws.queue.submit(&amina()).unwrap();

    let outcome = ws.moderator().approve(&ws.admin(), &entry.id).unwrap();
    assert_eq!(outcome.decision, Decision::Promoted);

    assert_eq!(ws.registry.list().unwrap(), vec![amina()]);
    assert!(ws.queue.list_pending().unwrap().is_empty());
    assert_eq!(
        ws.registry_file(),
        "Name,Phone,Age,Disability Type,Assistive Device,Sub-County,Ward\n\
         Amina,0711,34,Visual,White Cane,Kitui Central,Township\n"
    );
}

#[test]
fn test_blank_submission_leaves_the_queue_file_unchanged() {
    let ws = Workspace::new();
    ws.queue.submit(&amina()).unwrap();
    let before = fs::read(ws.config.pending_path()).unwrap();

    let blank_device = Record {
        assistive_device: "  ".to_string(),
        ..amina()
    };
    assert!(ws.queue.submit(&blank_device).unwrap_err().is_validation());
    assert_eq!(fs::read(ws.config.pending_path()).unwrap(), before);
}

#[test]
fn test_reject_only_shrinks_the_queue() {
    let ws = Workspace::new();
    seed(&ws.config.registry_path(), &[john("John", "Crutches")]);
    ws.queue.submit(&amina()).unwrap();
    let listing = ws.queue.list_pending().unwrap();

    let outcome = ws
        .moderator()
        .reject_at(&ws.admin(), &listing.snapshot, 0)
        .unwrap();
    assert_eq!(outcome.record, amina());
    assert_eq!(ws.registry.list().unwrap().len(), 1);
    assert!(ws.queue.list_pending().unwrap().is_empty());
}

#[test]
fn test_bulk_edit_touches_only_rows_with_the_phone() {
    let ws = Workspace::new();
    seed(
        &ws.config.registry_path(),
        &[
            john("John", "Crutches"),
            amina(),
            john("John K", "Wheelchair"),
        ],
    );
    let untouched_line = "Amina,0711,34,Visual,White Cane,Kitui Central,Township";
    assert!(ws.registry_file().contains(untouched_line));

    let update = MemberUpdate {
        name: "John Kamau".to_string(),
        phone: "0722".to_string(),
        age: "40".to_string(),
        sub_county: "Kitui Rural".to_string(),
        ward: "Kisasi".to_string(),
    };
    let count = ws
        .registry
        .update_member(&ws.admin(), &PhoneKey::new("0722"), &update)
        .unwrap();
    assert_eq!(count, 2);

    let members = ws.registry.list().unwrap();
    assert_eq!(members[1], amina());
    assert!(ws.registry_file().contains(untouched_line));
    for (member, device) in [(&members[0], "Crutches"), (&members[2], "Wheelchair")] {
        assert_eq!(member.name, "John Kamau");
        assert_eq!(member.age, "40");
        assert_eq!(member.ward, "Kisasi");
        assert_eq!(member.disability_type, "Physical");
        assert_eq!(member.assistive_device, device);
    }
}

#[test]
fn test_deleting_an_unknown_name_changes_nothing() {
    let ws = Workspace::new();
    seed(&ws.config.registry_path(), &[amina()]);
    let before = ws.registry_file();

    let err = ws
        .registry
        .delete_member(&ws.admin(), &MemberSelector::Name("Nobody".to_string()))
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(ws.registry_file(), before);
}

#[test]
fn test_store_files_round_trip_in_order() {
    let ws = Workspace::new();
    let records = vec![
        john("John", "Crutches"),
        Record {
            name: "Wanjiru, \"Shiru\"".to_string(),
            age: String::new(),
            ..amina()
        },
        amina(),
    ];
    let store = CsvStore::new(ws.config.registry_path());
    store.save(&records).unwrap();
    assert_eq!(store.load().unwrap(), records);
}

#[test]
fn test_restore_brings_back_a_deleted_member() {
    let ws = Workspace::new();
    seed(&ws.config.registry_path(), &[amina()]);
    let before = ws.registry_file();

    let backup = ws.backups.create(&ws.admin()).unwrap().unwrap();
    ws.registry
        .delete_member(&ws.admin(), &MemberSelector::Identifier(amina().identifier()))
        .unwrap();
    assert!(ws.registry.list().unwrap().is_empty());

    ws.backups.restore(&ws.admin(), &backup.path).unwrap();
    assert_eq!(ws.registry_file(), before);
}

#[test]
fn test_wrong_secret_grants_nothing() {
    let ws = Workspace::new();
    let gate = AccessGate::from_config(&ws.config);
    assert!(!gate.authenticate("guess"));
    assert!(gate.grant("guess").is_err());
}

#[test]
fn test_two_handles_on_one_workspace_lose_no_submissions() {
    let ws = Workspace::new();
    let (other_queue, _, _) = pwdregistry::open(&ws.config).unwrap();

    thread::scope(|scope| {
        for queue in [&ws.queue, &other_queue] {
            scope.spawn(move || {
                for _ in 0..50 {
                    queue.submit(&amina()).unwrap();
                }
            });
        }
    });

    let listing = ws.queue.list_pending().unwrap();
    assert_eq!(listing.len(), 100);
    let ids: BTreeSet<u64> = listing.iter().map(|entry| entry.id.get()).collect();
    assert_eq!(ids.len(), 100);
    assert_eq!(other_queue.list_pending().unwrap(), listing);
}

#[test]
fn test_identical_submissions_are_decided_once_each() {
    let ws = Workspace::new();
    let first = ws.queue.submit(&amina()).unwrap().id;
    let second = ws.queue.submit(&amina()).unwrap().id;
    assert_ne!(first, second);

    ws.moderator().approve(&ws.admin(), &first).unwrap();
    let err = ws.moderator().approve(&ws.admin(), &first).unwrap_err();
    assert!(err.is_stale());
    assert_eq!(ws.registry.list().unwrap(), vec![amina()]);

    // A fresh handle reads the same numbering back from disk
    let (reopened, _, _) = pwdregistry::open(&ws.config).unwrap();
    let listing = reopened.list_pending().unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing.entries[0].id, second);

    ws.moderator().reject(&ws.admin(), &second).unwrap();
    assert!(ws.queue.list_pending().unwrap().is_empty());
    assert!(ws.queue.submit(&amina()).unwrap().id.get() > second.get());
}

#[test]
fn test_bulk_edit_reaches_rows_with_padded_phones() {
    let ws = Workspace::new();
    let padded = Record {
        phone: " 0722 ".to_string(),
        ..john("John", "Crutches")
    };
    seed(
        &ws.config.registry_path(),
        &[padded.clone(), john("John K", "Wheelchair"), amina()],
    );

    let update = MemberUpdate {
        name: "John Kamau".to_string(),
        phone: "0733".to_string(),
        age: "40".to_string(),
        sub_county: "Kitui Rural".to_string(),
        ward: "Kisasi".to_string(),
    };
    let count = ws
        .registry
        .update_member(&ws.admin(), &PhoneKey::of(&padded), &update)
        .unwrap();
    assert_eq!(count, 2);

    let members = ws.registry.list().unwrap();
    assert_eq!(members[0].phone, "0733");
    assert_eq!(members[1].phone, "0733");
    assert_eq!(members[2], amina());
}
