//! In-process cache.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::Cache;

struct Entry {
    value: Vec<u8>,
    expires: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }
}

/// [`Cache`] backed by a map behind a lock. Expired entries are dropped
/// lazily when read.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().unwrap();
            let entry = entries.get(key)?;
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
        }
        tracing::debug!(key, "Cache entry expired");
        self.entries.write().unwrap().remove(key);
        None
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) {
        let entry = Entry {
            value: value.to_vec(),
            expires: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.write().unwrap().insert(key.to_owned(), entry);
    }

    fn delete(&self, key: &str) {
        self.entries.write().unwrap().remove(key);
    }

    fn delete_many(&self, keys: &[String]) {
        let mut entries = self.entries.write().unwrap();
        for key in keys {
            entries.remove(key);
        }
    }
}
