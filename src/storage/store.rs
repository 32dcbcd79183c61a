use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::Result;

/// Identifies one tracker instance (one "tab"). Change notifications carry the
/// writer id so a tracker can skip its own writes.
pub type WriterId = u64;

pub fn new_writer_id() -> WriterId {
    rand::random()
}

/// Notification published after every successful write or removal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreChange {
    pub key: String,
    /// `None` when the key was removed.
    pub new_value: Option<String>,
    pub origin: WriterId,
}

/// Shared string key/value store visible to every tracker on the device.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Name used in logs
    fn name(&self) -> String;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String, origin: WriterId) -> Result<()>;

    async fn remove(&self, key: &str, origin: WriterId) -> Result<()>;

    /// Receive every change made after this call, including the caller's own.
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// Capacity of the change channels. A receiver that falls further behind
/// than this sees `Lagged` and reloads from the store.
pub const CHANGE_CHANNEL_CAPACITY: usize = 256;
