//! Round-trip and recovery tests for the on-disk snapshot.

use std::collections::BTreeMap;

use paxbank_storage::{Snapshot, Store};
use paxbank_types::{Ballot, Block, Transfer};

fn sample_transfer() -> Transfer {
    Transfer {
        sender_id: 1,
        receiver_id: 2,
        amount: 10,
        prev_hash: "0".into(),
        nonce: "deadbeefdeadbeefdeadbeefdeadbeef".into(),
        hash: "aa04".into(),
    }
}

fn sample_snapshot() -> Snapshot {
    let mut table = BTreeMap::new();
    for id in 1..=5u64 {
        table.insert(id, 100);
    }
    table.insert(1, 90);
    table.insert(2, 110);

    let mut snapshot = Snapshot {
        table,
        blockchain: vec![Block::committed(sample_transfer())],
        ..Default::default()
    };
    snapshot.seq_num.insert(0, 1);
    snapshot.promised_ballot.insert(0, Some(Ballot::new(1, 1, 0)));
    snapshot.accepted_ballot.insert(0, Some(Ballot::new(1, 1, 0)));
    snapshot.accepted_val.insert(0, Some(sample_transfer()));
    // depth 1: promised but nothing accepted yet
    snapshot.promised_ballot.insert(1, Some(Ballot::new(0, 3, 1)));
    snapshot.accepted_ballot.insert(1, None);
    snapshot.accepted_val.insert(1, None);
    snapshot
}

#[test]
fn persist_then_load_is_identity() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::new(dir.path(), 1);

    let snapshot = sample_snapshot();
    store.persist(&snapshot).unwrap();

    let restored = store.load().expect("snapshot should exist");
    assert_eq!(restored, snapshot);
}

#[test]
fn unset_slot_variables_stay_unset() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::new(dir.path(), 2);

    store.persist(&sample_snapshot()).unwrap();
    let restored = store.load().unwrap();

    assert_eq!(restored.accepted_ballot.get(&1), Some(&None));
    assert_eq!(restored.accepted_val.get(&1), Some(&None));
    assert_eq!(
        restored.promised_ballot.get(&1),
        Some(&Some(Ballot::new(0, 3, 1)))
    );
}

#[test]
fn persist_overwrites_previous_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::new(dir.path(), 4);

    let mut snapshot = sample_snapshot();
    store.persist(&snapshot).unwrap();

    snapshot.seq_num.insert(0, 2);
    snapshot.table.insert(1, 70);
    store.persist(&snapshot).unwrap();

    let restored = store.load().unwrap();
    assert_eq!(restored.seq_num.get(&0), Some(&2));
    assert_eq!(restored.table.get(&1), Some(&70));
}

#[test]
fn corrupt_snapshot_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::new(dir.path(), 5);

    std::fs::write(store.path(), b"{ not json").unwrap();
    assert!(store.load().is_none());
    assert!(store.try_load().is_err());
}

#[test]
fn on_disk_schema_uses_spec_field_names() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::new(dir.path(), 3);
    store.persist(&sample_snapshot()).unwrap();

    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();

    for field in [
        "table",
        "blockchain",
        "seq_num",
        "promised_ballot",
        "accepted_ballot",
        "accepted_val",
    ] {
        assert!(raw.get(field).is_some(), "missing field {field}");
    }

    // depth keys are strings, ballots are 3-element arrays, unset is null
    assert_eq!(raw["promised_ballot"]["0"], serde_json::json!([1, 1, 0]));
    assert_eq!(raw["accepted_ballot"]["1"], serde_json::Value::Null);
    assert_eq!(raw["blockchain"][0]["tag"], "COMMITTED");
    assert_eq!(raw["table"]["1"], 90);
}
