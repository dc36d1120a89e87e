use std::sync::Arc;

use tokio::sync::RwLock;

use super::model::{AggregateInventory, AppContextPair, Inventory};

/// Concurrently populated aggregate. Writers take a single coarse lock; readers
/// get a snapshot.
#[derive(Default)]
pub struct AggregateStore {
    inner: RwLock<AggregateInventory>,
}

impl AggregateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// First writer wins: returns `false` when the pair was already stored.
    pub async fn insert(&self, pair: AppContextPair, inventory: Inventory) -> bool {
        self.inner
            .write()
            .await
            .insert_if_absent(pair, Arc::new(inventory))
    }

    pub async fn has_app_id(&self, app_id: u32) -> bool {
        self.inner.read().await.has_app_id(app_id)
    }

    pub async fn has_context_id(&self, app_id: u32, context_id: u64) -> bool {
        self.inner.read().await.has_context_id(app_id, context_id)
    }

    pub async fn get(&self, pair: AppContextPair) -> Option<Arc<Inventory>> {
        self.inner
            .read()
            .await
            .get(pair.app_id, pair.context_id)
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn snapshot(&self) -> AggregateInventory {
        self.inner.read().await.clone()
    }
}
