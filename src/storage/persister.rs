use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::storage::store::{KeyValueStore, WriterId};

enum Command {
    Put(String),
    Remove,
    Flush(oneshot::Sender<()>),
}

/// Background writer for one key. Saves are queued without blocking the
/// caller and applied in order; failures are logged and never reach the
/// reducer.
pub struct Persister {
    tx: mpsc::UnboundedSender<Command>,
}

impl Persister {
    /// Must be called from within a Tokio runtime.
    pub fn spawn(store: Arc<dyn KeyValueStore>, key: String, writer: WriterId) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();

        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    Command::Put(value) => {
                        if let Err(e) = store.set(&key, value, writer).await {
                            warn!("Failed to persist {} to {}: {}", key, store.name(), e);
                        }
                    }
                    Command::Remove => {
                        if let Err(e) = store.remove(&key, writer).await {
                            warn!("Failed to remove {} from {}: {}", key, store.name(), e);
                        }
                    }
                    Command::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("Persister for {} stopped", key);
        });

        Self { tx }
    }

    pub fn save(&self, encoded: String) {
        if self.tx.send(Command::Put(encoded)).is_err() {
            warn!("Persister stopped; dropping save");
        }
    }

    pub fn clear(&self) {
        if self.tx.send(Command::Remove).is_err() {
            warn!("Persister stopped; dropping removal");
        }
    }

    /// Wait until every command queued before this call has been applied.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).is_err() {
            return;
        }
        let _ = done_rx.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn test_saves_apply_in_order() {
        let store = Arc::new(MemoryStore::new());
        let persister = Persister::spawn(store.clone(), "k".to_string(), 1);

        persister.save("a".to_string());
        persister.save("b".to_string());
        persister.flush().await;
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("b"));

        persister.clear();
        persister.flush().await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
