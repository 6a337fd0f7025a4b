//! Eviction Log
//!
//! Remembers backends that were evicted after a failed probe or relay,
//! so the health checker can put them back once they answer again.

use crate::domain::entities::BackendEntry;
use dashmap::DashMap;
use std::time::Instant;

/// An entry removed from the registry because it was unreachable.
#[derive(Debug, Clone)]
pub struct EvictedBackend {
    /// The entry as it was registered (name and weight preserved)
    pub entry: BackendEntry,
    /// When it was evicted
    pub evicted_at: Instant,
    /// Why it was evicted
    pub reason: String,
}

/// Concurrent record of evicted backends, keyed by url.
#[derive(Debug, Default)]
pub struct EvictionLog {
    evicted: DashMap<String, EvictedBackend>,
}

impl EvictionLog {
    pub fn new() -> Self {
        Self {
            evicted: DashMap::new(),
        }
    }

    /// Record an eviction. A later eviction of the same url replaces it.
    pub fn record(&self, entry: BackendEntry, reason: impl Into<String>) {
        let url = entry.url.clone();
        self.evicted.insert(
            url,
            EvictedBackend {
                entry,
                evicted_at: Instant::now(),
                reason: reason.into(),
            },
        );
    }

    /// Drop the record for `url`. Returns whether one existed.
    pub fn forget(&self, url: &str) -> bool {
        self.evicted.remove(url).is_some()
    }

    /// Get the record for `url`.
    pub fn get(&self, url: &str) -> Option<EvictedBackend> {
        self.evicted.get(url).map(|e| e.value().clone())
    }

    /// All recorded evictions.
    pub fn all(&self) -> Vec<EvictedBackend> {
        self.evicted.iter().map(|e| e.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.evicted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evicted.is_empty()
    }
}
