// src/cache.rs
use moka::future::Cache;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

// Entries are keyed by the generation seen when the database read started.
// A read that races a mutation lands under an old generation nobody looks up.
pub struct ListCache {
    entries: Cache<String, Value>,
    generation: AtomicU64,
}

impl ListCache {
    fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
            generation: AtomicU64::new(0),
        }
    }

    /// Take this before querying the database and pass it to `get`/`insert`.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub async fn get(&self, generation: u64, key: &str) -> Option<Value> {
        self.entries.get(&entry_key(generation, key)).await
    }

    pub async fn insert(&self, generation: u64, key: &str, value: Value) {
        self.entries.insert(entry_key(generation, key), value).await;
    }

    /// Call after the mutation has committed.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.entries.invalidate_all();
    }
}

fn entry_key(generation: u64, key: &str) -> String {
    format!("{}#{}", generation, key)
}

#[derive(Clone)]
pub struct ListCaches {
    pub devices: Arc<ListCache>,
    pub accounts: Arc<ListCache>,
}

impl ListCaches {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            devices: Arc::new(ListCache::new(capacity, ttl)),
            accounts: Arc::new(ListCache::new(capacity, ttl)),
        }
    }

    pub fn devices_changed(&self) {
        self.devices.invalidate();
    }

    // Accounts reference devices; their pages may show stale assignments.
    pub fn devices_removed(&self) {
        self.devices.invalidate();
        self.accounts.invalidate();
    }

    pub fn accounts_changed(&self) {
        self.accounts.invalidate();
    }
}
