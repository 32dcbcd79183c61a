use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tokio::sync::broadcast;

use crate::{
    models::Result,
    storage::store::{KeyValueStore, StoreChange, WriterId, CHANGE_CHANNEL_CAPACITY},
};

/// Process-local store. Trackers sharing one `Arc<MemoryStore>` behave like
/// tabs sharing browser storage.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    changes: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            entries: RwLock::new(HashMap::new()),
            changes,
        }
    }

    /// Write without notifying anyone, as an external tool editing storage
    /// behind the trackers' backs would.
    pub fn set_silently(&self, key: &str, value: impl Into<String>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.into());
    }

    fn publish(&self, key: &str, new_value: Option<String>, origin: WriterId) {
        // No receivers is fine
        let _ = self.changes.send(StoreChange {
            key: key.to_string(),
            new_value,
            origin,
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn name(&self) -> String {
        "memory".to_string()
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    async fn set(&self, key: &str, value: String, origin: WriterId) -> Result<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.clone());
        self.publish(key, Some(value), origin);
        Ok(())
    }

    async fn remove(&self, key: &str, origin: WriterId) -> Result<()> {
        let removed = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        if removed.is_some() {
            self.publish(key, None, origin);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "v1".to_string(), 1).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v1"));

        store.remove("k", 1).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_changes_carry_origin_and_value() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();

        store.set("k", "v1".to_string(), 7).await.unwrap();
        store.remove("k", 8).await.unwrap();
        // Removing a missing key is silent
        store.remove("k", 8).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.origin, 7);
        assert_eq!(first.new_value.as_deref(), Some("v1"));

        let second = rx.recv().await.unwrap();
        assert_eq!(second.origin, 8);
        assert_eq!(second.new_value, None);

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_silent_write_does_not_notify() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();
        store.set_silently("k", "v");
        assert!(rx.try_recv().is_err());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
