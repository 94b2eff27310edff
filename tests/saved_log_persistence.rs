//! Integration tests for saved log persistence
//!
//! These tests use the file store in a temporary data directory:
//! - Snapshots survive a restart in insertion order
//! - Corrupt or missing snapshots restore as an empty log
//! - Only the configured key is written

mod common;

use agrolink_rs::config::DEFAULT_SAVED_LOG_KEY;
use agrolink_rs::storage::{FileStore, PersistenceProvider, SavedLog};
use common::builders::FrameBuilder;

fn open(dir: &std::path::Path) -> SavedLog {
    SavedLog::restore(Box::new(FileStore::new(dir)), DEFAULT_SAVED_LOG_KEY)
}

#[test]
fn test_log_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let first = FrameBuilder::new("12.0N 4.0P 6.0K NPK").at(1_000).saved();
    let second = FrameBuilder::new("189H 21.8T Hum&Temp").at(2_000).saved();
    let third = FrameBuilder::new("8.10 ph").at(3_000).saved();

    {
        let mut log = open(dir.path());
        log.toggle(third.clone());
        log.toggle(first.clone());
        log.toggle(second.clone());
        log.delete(&first.id);
    }

    let log = open(dir.path());
    assert_eq!(log.list(), &[third, second]);
    assert!(dir.path().join("messages.json").exists());
}

#[test]
fn test_toggle_twice_restores_membership_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let kept = FrameBuilder::new("ph 7").at(10).saved();
    let flipped = FrameBuilder::new("60H 25T").at(20).saved();

    let mut log = open(dir.path());
    log.toggle(kept.clone());
    log.toggle(flipped.clone());
    log.toggle(flipped.clone());

    let restored = open(dir.path());
    assert_eq!(restored.list(), &[kept]);
    assert!(!restored.contains(&flipped.id));
}

#[test]
fn test_corrupt_snapshot_restores_empty() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("messages.json"), b"\x00\x01garbage").unwrap();

    let mut log = open(dir.path());
    assert!(log.is_empty());

    // The next mutation replaces the corrupt file
    let msg = FrameBuilder::new("8.10 ph").saved();
    log.toggle(msg.clone());
    assert_eq!(open(dir.path()).list(), &[msg]);
}

#[test]
fn test_missing_directory_restores_empty() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("not").join("yet");

    let mut log = open(&nested);
    assert!(log.is_empty());

    log.toggle(FrameBuilder::new("ph 6").saved());
    assert!(nested.join("messages.json").exists());
}

#[test]
fn test_only_saved_log_key_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let mut log = open(dir.path());
    log.toggle(FrameBuilder::new("ph 6").saved());

    let entries: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries, vec!["messages.json"]);

    let store = FileStore::new(dir.path());
    assert!(store.load("pending").unwrap().is_none());
}
