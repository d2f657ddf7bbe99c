//! Registry of pooled proxies.

use crate::proxy::{Proxy, ProxyState};
use crate::state::PoolSnapshot;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Keyed store of proxy records. Pure data access: no state-machine policy.
#[async_trait]
pub trait ProxyStorage: Send + Sync {
    /// Insert `proxy` unless its id is already present. Returns whether it was inserted.
    async fn add(&self, proxy: Arc<Proxy>) -> bool;

    async fn get(&self, id: &str) -> Option<Arc<Proxy>>;

    /// Store the latest version of an existing record. Unknown ids are ignored.
    async fn update(&self, proxy: &Arc<Proxy>);

    async fn remove(&self, id: &str) -> Option<Arc<Proxy>>;

    async fn list_by_state(&self, state: ProxyState) -> Vec<Arc<Proxy>>;

    async fn list(&self) -> Vec<Arc<Proxy>>;

    async fn len(&self) -> usize;

    /// Aggregate view computed by scanning every record.
    async fn snapshot(&self) -> PoolSnapshot;
}

/// Storage backed by a hash map in memory.
#[derive(Default)]
pub struct InMemoryStorage {
    proxies: RwLock<HashMap<String, Arc<Proxy>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProxyStorage for InMemoryStorage {
    async fn add(&self, proxy: Arc<Proxy>) -> bool {
        let mut proxies = self.proxies.write();
        if proxies.contains_key(proxy.id()) {
            return false;
        }
        proxies.insert(proxy.id().to_string(), proxy);
        true
    }

    async fn get(&self, id: &str) -> Option<Arc<Proxy>> {
        self.proxies.read().get(id).cloned()
    }

    async fn update(&self, proxy: &Arc<Proxy>) {
        if let Some(slot) = self.proxies.write().get_mut(proxy.id()) {
            *slot = Arc::clone(proxy);
        }
    }

    async fn remove(&self, id: &str) -> Option<Arc<Proxy>> {
        self.proxies.write().remove(id)
    }

    async fn list_by_state(&self, state: ProxyState) -> Vec<Arc<Proxy>> {
        self.proxies
            .read()
            .values()
            .filter(|proxy| proxy.state() == state)
            .cloned()
            .collect()
    }

    async fn list(&self) -> Vec<Arc<Proxy>> {
        self.proxies.read().values().cloned().collect()
    }

    async fn len(&self) -> usize {
        self.proxies.read().len()
    }

    async fn snapshot(&self) -> PoolSnapshot {
        let proxies: Vec<Arc<Proxy>> = self.proxies.read().values().cloned().collect();
        PoolSnapshot::scan(&proxies)
    }
}
