use super::{CacheError, CacheStore};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Instant,
}

impl Entry {
    fn new(value: Value, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Full scans of the map happen at most this often, on the next write.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug)]
struct Store {
    entries: HashMap<String, Entry>,
    next_sweep: Instant,
}

impl Store {
    fn live_entry(&self, key: &str) -> Option<&Entry> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_live(Instant::now()))
    }

    /// Drop every expired entry once per [`SWEEP_INTERVAL`], else just `key`.
    fn purge_expired(&mut self, key: &str) {
        let now = Instant::now();
        if now >= self.next_sweep {
            self.entries.retain(|_, entry| entry.is_live(now));
            self.next_sweep = now + SWEEP_INTERVAL;
        } else if self
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_live(now))
        {
            self.entries.remove(key);
        }
    }

    fn insert_text(&mut self, key: &str, value: &str, ttl: Duration) {
        self.purge_expired(key);
        self.entries.insert(
            key.to_string(),
            Entry::new(Value::Text(value.to_string()), ttl),
        );
    }

    fn insert_member(&mut self, key: &str, member: &str, ttl: Duration) {
        self.purge_expired(key);
        let expires_at = Instant::now() + ttl;
        match self.entries.get_mut(key) {
            Some(Entry {
                value: Value::Set(members),
                expires_at: current,
            }) => {
                members.insert(member.to_string());
                *current = expires_at;
            }
            _ => {
                let members = HashSet::from([member.to_string()]);
                self.entries
                    .insert(key.to_string(), Entry::new(Value::Set(members), ttl));
            }
        }
    }
}

/// In-process cache guarded by one lock.
///
/// Expired entries are invisible to readers. Writers drop the expired entry they
/// touch, and every [`SWEEP_INTERVAL`] one of them clears out the whole map.
/// Set-valued and string-valued keys share one namespace, like Redis.
#[derive(Debug)]
pub struct MemoryCache {
    store: RwLock<Store>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self {
            store: RwLock::new(Store {
                entries: HashMap::new(),
                next_sweep: Instant::now() + SWEEP_INTERVAL,
            }),
        }
    }
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.store.write().await.insert_text(key, value, ttl);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<String, CacheError> {
        let store = self.store.read().await;
        match store.live_entry(key) {
            Some(Entry {
                value: Value::Text(value),
                ..
            }) => Ok(value.clone()),
            _ => Err(CacheError::Miss),
        }
    }

    async fn take(&self, key: &str) -> Result<String, CacheError> {
        let mut store = self.store.write().await;
        store.purge_expired(key);
        match store.entries.remove(key) {
            Some(Entry {
                value: Value::Text(value),
                ..
            }) => Ok(value),
            Some(entry) => {
                // Not a string value; leave it in place.
                store.entries.insert(key.to_string(), entry);
                Err(CacheError::Miss)
            }
            None => Err(CacheError::Miss),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut store = self.store.write().await;
        store.purge_expired(key);
        store.entries.remove(key);
        Ok(())
    }

    async fn add_to_set(&self, key: &str, member: &str, ttl: Duration) -> Result<(), CacheError> {
        self.store.write().await.insert_member(key, member, ttl);
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, CacheError> {
        let store = self.store.read().await;
        match store.live_entry(key) {
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => Ok(members.iter().cloned().collect()),
            _ => Err(CacheError::Miss),
        }
    }

    async fn remove_from_set(&self, key: &str, member: &str) -> Result<(), CacheError> {
        let mut store = self.store.write().await;
        store.purge_expired(key);
        let now_empty = match store.entries.get_mut(key) {
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => {
                members.remove(member);
                members.is_empty()
            }
            _ => false,
        };
        if now_empty {
            store.entries.remove(key);
        }
        Ok(())
    }

    async fn set_with_index(
        &self,
        key: &str,
        value: &str,
        index_key: &str,
        member: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut store = self.store.write().await;
        store.insert_text(key, value, ttl);
        store.insert_member(index_key, member, ttl);
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}
