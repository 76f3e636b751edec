//! Provider cache
//!
//! An in-memory mirror of every provider in the store, keyed by identifier.
//!
//! ## Consistency
//!
//! - The snapshot is never patched: `rebuild()` reads the whole table, builds
//!   a new map and swaps it in under the write lock
//! - Readers clone the current `Arc` and never observe a half-built map
//! - Rebuilds are serialized so two concurrent writers cannot interleave
//!   their swaps out of order
//! - A failed rebuild leaves the previous snapshot in place

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::Result;
use crate::records::{self, ProviderRecord};
use crate::traits::StoreGateway;

/// Providers keyed by identifier
pub type ProviderMap = BTreeMap<String, ProviderRecord>;

/// Process-wide provider cache
///
/// Constructed once at startup and shared by handle with every request handler.
pub struct ProviderCache {
    store: Arc<dyn StoreGateway>,
    snapshot: RwLock<Arc<ProviderMap>>,
    rebuild_lock: Mutex<()>,
}

impl ProviderCache {
    /// Create an empty (but valid) cache over `store`
    pub fn new(store: Arc<dyn StoreGateway>) -> Self {
        Self {
            store,
            snapshot: RwLock::new(Arc::new(ProviderMap::new())),
            rebuild_lock: Mutex::new(()),
        }
    }

    /// Discard the current snapshot and reload every provider from the store
    ///
    /// # Returns
    ///
    /// The number of providers now cached.
    pub async fn rebuild(&self) -> Result<usize> {
        let _guard = self.rebuild_lock.lock().await;

        let fresh: ProviderMap = records::load_all(self.store.as_ref())
            .await?
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();
        let count = fresh.len();

        *self.snapshot.write().await = Arc::new(fresh);
        debug!("Provider cache rebuilt: {} provider(s)", count);

        Ok(count)
    }

    /// Look up a single provider
    pub async fn get(&self, id: &str) -> Option<ProviderRecord> {
        self.snapshot.read().await.get(id).cloned()
    }

    /// Current snapshot of all providers
    pub async fn list(&self) -> Arc<ProviderMap> {
        Arc::clone(&*self.snapshot.read().await)
    }

    /// Number of cached providers
    pub async fn len(&self) -> usize {
        self.snapshot.read().await.len()
    }

    /// Whether the cache holds no providers
    pub async fn is_empty(&self) -> bool {
        self.snapshot.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::NewProvider;
    use crate::store::SqliteStore;
    use tempfile::TempDir;

    async fn cache_over_fresh_store(dir: &TempDir) -> (Arc<SqliteStore>, ProviderCache) {
        let store = Arc::new(SqliteStore::new(dir.path().join("config.db")));
        store.initialize_schema().await.unwrap();
        let cache = ProviderCache::new(store.clone());
        (store, cache)
    }

    #[tokio::test]
    async fn test_cache_starts_empty() {
        let dir = TempDir::new().unwrap();
        let (_store, cache) = cache_over_fresh_store(&dir).await;

        assert!(cache.is_empty().await);
        assert!(cache.list().await.is_empty());
        assert_eq!(cache.get("missing").await, None);
    }

    #[tokio::test]
    async fn test_rebuild_mirrors_store() {
        let dir = TempDir::new().unwrap();
        let (store, cache) = cache_over_fresh_store(&dir).await;

        let mut ids = Vec::new();
        for n in 0..5 {
            let stored = NewProvider::new(format!("ns{}", n), format!("10.0.0.{}", n))
                .unwrap()
                .insert(store.as_ref())
                .await
                .unwrap();
            ids.push(stored.id);
        }

        // Writes alone do not touch the snapshot
        assert!(cache.is_empty().await);

        assert_eq!(cache.rebuild().await.unwrap(), 5);
        assert_eq!(cache.len().await, 5);
        for id in &ids {
            assert!(cache.get(id).await.is_some());
        }
    }

    #[tokio::test]
    async fn test_rebuild_drops_rows_removed_from_store() {
        let dir = TempDir::new().unwrap();
        let (store, cache) = cache_over_fresh_store(&dir).await;

        let stored = NewProvider::new("ns1", "1.2.3.4")
            .unwrap()
            .insert(store.as_ref())
            .await
            .unwrap();
        cache.rebuild().await.unwrap();
        assert!(cache.get(&stored.id).await.is_some());

        store.execute("DELETE FROM PROVIDERS", Vec::new()).await.unwrap();
        cache.rebuild().await.unwrap();
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let (store, cache) = cache_over_fresh_store(&dir).await;

        NewProvider::new("ns1", "1.2.3.4")
            .unwrap()
            .insert(store.as_ref())
            .await
            .unwrap();
        cache.rebuild().await.unwrap();

        store.execute("DROP TABLE PROVIDERS", Vec::new()).await.unwrap();
        assert!(cache.rebuild().await.is_err());
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_snapshot_outlives_rebuild() {
        let dir = TempDir::new().unwrap();
        let (store, cache) = cache_over_fresh_store(&dir).await;

        let before = cache.list().await;
        NewProvider::new("ns1", "1.2.3.4")
            .unwrap()
            .insert(store.as_ref())
            .await
            .unwrap();
        cache.rebuild().await.unwrap();

        assert!(before.is_empty());
        assert_eq!(cache.list().await.len(), 1);
    }
}
