//! Curated, persisted log of saved messages
//!
//! The log keeps insertion order and never holds two messages with the same
//! id. Every mutation writes a full JSON snapshot through the
//! [`PersistenceProvider`]; a failed write is logged and the in-memory log
//! stays authoritative. Restoring from a missing or unreadable snapshot
//! yields an empty log.

use crate::error::{AgrolinkError, Result, ResultExt};
use crate::types::SavedMessage;
use serde::{Deserialize, Serialize};

use super::PersistenceProvider;

const SNAPSHOT_VERSION: u32 = 1;

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

/// On-disk shape of the log
#[derive(Debug, Serialize, Deserialize)]
struct SavedLogSnapshot {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    messages: Vec<SavedMessage>,
}

/// Saved messages in insertion order
pub struct SavedLog {
    key: String,
    store: Box<dyn PersistenceProvider>,
    messages: Vec<SavedMessage>,
}

impl SavedLog {
    /// Empty log that persists under `key`; nothing is read from the store
    pub fn new(store: Box<dyn PersistenceProvider>, key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            store,
            messages: Vec::new(),
        }
    }

    /// Restore the log persisted under `key`
    ///
    /// Never fails: a missing snapshot, a store error or undecodable bytes
    /// all produce an empty log.
    pub fn restore(store: Box<dyn PersistenceProvider>, key: impl Into<String>) -> Self {
        let mut log = Self::new(store, key);
        match log.store.load(&log.key) {
            Ok(Some(bytes)) => match decode_snapshot(&bytes) {
                Ok(messages) => {
                    log.messages = messages;
                    tracing::info!(
                        "Restored {} saved message(s) from '{}'",
                        log.messages.len(),
                        log.key
                    );
                }
                Err(e) => {
                    tracing::warn!("Discarding unreadable saved log '{}': {}", log.key, e);
                }
            },
            Ok(None) => {
                tracing::debug!("No saved log under '{}', starting empty", log.key);
            }
            Err(e) => {
                tracing::warn!("Failed to load saved log '{}': {}", log.key, e);
            }
        }
        log
    }

    /// Save `message`, or unsave it if its id is already present
    ///
    /// Returns `true` when the message is saved after the call.
    pub fn toggle(&mut self, message: SavedMessage) -> bool {
        let saved = match self.position(&message.id) {
            Some(index) => {
                let removed = self.messages.remove(index);
                tracing::info!("Unsaved message {}", removed.id);
                false
            }
            None => {
                tracing::info!("Saved message {}", message.id);
                self.messages.push(message);
                true
            }
        };
        self.persist();
        saved
    }

    /// Toggle by id: unsave the stored message, or save the one the id
    /// describes
    ///
    /// Fails with [`AgrolinkError::ValidationFailed`] when `id` is not
    /// stored and is not of the form `"<millis>-<text>"`.
    pub fn toggle_id(&mut self, id: &str) -> Result<bool> {
        let message = match self.get(id) {
            Some(message) => message.clone(),
            None => SavedMessage::from_id(id).ok_or_else(|| {
                AgrolinkError::ValidationFailed(format!("'{}' is not a saved message id", id))
            })?,
        };
        Ok(self.toggle(message))
    }

    /// Remove the message with `id`
    ///
    /// Returns `false` (and writes nothing) when no such message exists.
    pub fn delete(&mut self, id: &str) -> bool {
        let Some(index) = self.position(id) else {
            tracing::debug!("Delete of unknown message {} ignored", id);
            return false;
        };
        self.messages.remove(index);
        tracing::info!("Deleted message {}", id);
        self.persist();
        true
    }

    /// All messages, oldest save first
    pub fn list(&self) -> &[SavedMessage] {
        &self.messages
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&SavedMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Storage key this log persists under
    pub fn key(&self) -> &str {
        &self.key
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }

    fn persist(&self) {
        let result = encode_snapshot(&self.messages)
            .and_then(|bytes| self.store.save(&self.key, &bytes))
            .with_context(|| format!("Failed to persist saved log '{}'", self.key));
        if let Err(e) = result {
            tracing::warn!("{}", e);
        }
    }
}

impl std::fmt::Debug for SavedLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SavedLog")
            .field("key", &self.key)
            .field("messages", &self.messages)
            .finish_non_exhaustive()
    }
}

fn encode_snapshot(messages: &[SavedMessage]) -> Result<Vec<u8>> {
    let snapshot = SavedLogSnapshot {
        version: SNAPSHOT_VERSION,
        messages: messages.to_vec(),
    };
    Ok(serde_json::to_vec_pretty(&snapshot)?)
}

/// Decode a snapshot, dropping any repeated id after its first occurrence
fn decode_snapshot(bytes: &[u8]) -> Result<Vec<SavedMessage>> {
    let snapshot: SavedLogSnapshot = serde_json::from_slice(bytes)?;
    if snapshot.version > SNAPSHOT_VERSION {
        tracing::warn!(
            "Saved log snapshot version {} is newer than supported version {}",
            snapshot.version,
            SNAPSHOT_VERSION
        );
    }

    let mut messages: Vec<SavedMessage> = Vec::with_capacity(snapshot.messages.len());
    for message in snapshot.messages {
        if messages.iter().any(|m| m.id == message.id) {
            tracing::warn!("Dropping duplicate saved message {}", message.id);
            continue;
        }
        messages.push(message);
    }
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::{MemoryStore, MockPersistenceProvider};
    use chrono::{TimeZone, Utc};

    fn message(millis: i64, text: &str) -> SavedMessage {
        SavedMessage::new(text, Utc.timestamp_millis_opt(millis).unwrap())
    }

    fn memory_log(store: &MemoryStore) -> SavedLog {
        SavedLog::restore(Box::new(store.clone()), "messages")
    }

    #[test]
    fn test_toggle_saves_then_unsaves() {
        let store = MemoryStore::new();
        let mut log = memory_log(&store);
        let msg = message(1, "8.10 ph");

        assert!(log.toggle(msg.clone()));
        assert!(log.contains(&msg.id));
        assert!(!log.toggle(msg.clone()));
        assert!(!log.contains(&msg.id));
        assert!(log.is_empty());
    }

    #[test]
    fn test_toggle_round_trip_preserves_order() {
        let store = MemoryStore::new();
        let mut log = memory_log(&store);
        let a = message(1, "a");
        let b = message(2, "b");
        let c = message(3, "c");
        log.toggle(a.clone());
        log.toggle(b.clone());

        let before = log.list().to_vec();
        log.toggle(c.clone());
        log.toggle(c);
        assert_eq!(log.list(), before.as_slice());
    }

    #[test]
    fn test_colliding_id_unsaves_first() {
        let store = MemoryStore::new();
        let mut log = memory_log(&store);

        assert!(log.toggle(message(5, "8.10 ph")));
        assert!(!log.toggle(message(5, "8.10 ph")));
        assert_eq!(log.len(), 0);
    }

    #[test]
    fn test_toggle_id_unsaves_existing_then_saves_again() {
        let store = MemoryStore::new();
        let mut log = memory_log(&store);
        let msg = message(1_700_000_000_000, "8.10 ph");
        log.toggle(msg.clone());

        assert!(!log.toggle_id(&msg.id).unwrap());
        assert!(log.is_empty());
        assert!(log.toggle_id(&msg.id).unwrap());
        assert_eq!(log.list(), &[msg]);
    }

    #[test]
    fn test_toggle_id_rejects_malformed_id() {
        let store = MemoryStore::new();
        let mut log = memory_log(&store);

        let err = log.toggle_id("not-an-id").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        assert!(log.is_empty());
        assert!(store.get_raw("messages").is_none());
    }

    #[test]
    fn test_delete_absent_is_noop() {
        let store = MemoryStore::new();
        let mut log = memory_log(&store);
        log.toggle(message(1, "a"));

        assert!(!log.delete("999-missing"));
        assert_eq!(log.len(), 1);
        assert!(log.delete("1-a"));
        assert!(log.is_empty());
    }

    #[test]
    fn test_restore_reproduces_order() {
        let store = MemoryStore::new();
        {
            let mut log = memory_log(&store);
            log.toggle(message(3, "third-saved-first"));
            log.toggle(message(1, "first"));
            log.toggle(message(2, "second"));
            log.delete("1-first");
        }

        let restored = memory_log(&store);
        let ids: Vec<&str> = restored.list().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["3-third-saved-first", "2-second"]);
    }

    #[test]
    fn test_restore_corrupt_snapshot_is_empty() {
        let store = MemoryStore::new();
        store.insert_raw("messages", b"{not json");
        assert!(memory_log(&store).is_empty());
    }

    #[test]
    fn test_restore_drops_duplicate_ids() {
        let store = MemoryStore::new();
        let msg = message(1, "x");
        let snapshot = SavedLogSnapshot {
            version: 1,
            messages: vec![msg.clone(), msg.clone()],
        };
        store.insert_raw("messages", &serde_json::to_vec(&snapshot).unwrap());

        let log = memory_log(&store);
        assert_eq!(log.list(), &[msg]);
    }

    #[test]
    fn test_restore_store_error_is_empty() {
        let mut store = MockPersistenceProvider::new();
        store
            .expect_load()
            .returning(|_| Err(AgrolinkError::Storage("permission denied".into())));

        let log = SavedLog::restore(Box::new(store), "messages");
        assert!(log.is_empty());
    }

    #[test]
    fn test_every_mutation_writes_snapshot() {
        let mut store = MockPersistenceProvider::new();
        store.expect_load().returning(|_| Ok(None));
        store
            .expect_save()
            .withf(|key, bytes| key == "messages" && !bytes.is_empty())
            .times(3)
            .returning(|_, _| Ok(()));

        let mut log = SavedLog::restore(Box::new(store), "messages");
        log.toggle(message(1, "a"));
        log.toggle(message(2, "b"));
        log.delete("1-a");
        // absent ids do not write
        log.delete("1-a");
    }

    #[test]
    fn test_write_failure_keeps_memory_state() {
        let mut store = MockPersistenceProvider::new();
        store.expect_load().returning(|_| Ok(None));
        store
            .expect_save()
            .returning(|_, _| Err(AgrolinkError::Storage("disk full".into())));

        let mut log = SavedLog::restore(Box::new(store), "messages");
        assert!(log.toggle(message(1, "a")));
        assert!(log.contains("1-a"));
    }

    #[test]
    fn test_snapshot_format() {
        let store = MemoryStore::new();
        let mut log = memory_log(&store);
        log.toggle(message(1_700_000_000_000, "60H 25T"));

        let raw = store.get_raw("messages").unwrap();
        let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["messages"][0]["id"], "1700000000000-60H 25T");
        assert_eq!(value["messages"][0]["text"], "60H 25T");
    }
}
