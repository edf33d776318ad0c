//! Time-bounded response cache keyed by a fingerprint of the normalized query.
//!
//! Queries are lowercased and trimmed before hashing, so `"  Hello World  "`
//! and `"hello world"` share an entry. Expired entries are dropped lazily on
//! lookup. When a new key arrives at a full cache the entry with the oldest
//! insertion time is evicted first.
//!
//! The cache does no locking of its own; the owner serializes access.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(query: &str) -> Self {
        Self(*blake3::hash(normalize_query(query).as_bytes()).as_bytes())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    pub response: String,
    pub created_at: Instant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub ttl: Duration,
}

#[derive(Clone, Debug)]
pub struct ResponseCache {
    entries: BTreeMap<Fingerprint, CacheEntry>,
    ttl: Duration,
    capacity: usize,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

impl ResponseCache {
    /// A zero capacity is treated as one so a store is always observable.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self { entries: BTreeMap::new(), ttl, capacity: capacity.max(1) }
    }

    pub fn lookup(&mut self, query: &str) -> Option<String> {
        self.lookup_at(query, Instant::now())
    }

    pub fn lookup_at(&mut self, query: &str, now: Instant) -> Option<String> {
        let key = Fingerprint::of(query);
        let entry = self.entries.get(&key)?;
        if now.saturating_duration_since(entry.created_at) < self.ttl {
            return Some(entry.response.clone());
        }

        self.entries.remove(&key);
        None
    }

    pub fn store(&mut self, query: &str, response: impl Into<String>) {
        self.store_at(query, response, Instant::now());
    }

    pub fn store_at(&mut self, query: &str, response: impl Into<String>, now: Instant) {
        let key = Fingerprint::of(query);
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.entries.insert(key, CacheEntry { response: response.into(), created_at: now });
    }

    pub fn contains(&self, query: &str) -> bool {
        self.entries.contains_key(&Fingerprint::of(query))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats { entries: self.entries.len(), capacity: self.capacity, ttl: self.ttl }
    }

    // Linear scan; ties go to the first key in fingerprint order.
    fn evict_oldest(&mut self) {
        let oldest =
            self.entries.iter().min_by_key(|(_, entry)| entry.created_at).map(|(key, _)| *key);
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}
