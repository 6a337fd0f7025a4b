//! In-Memory Backend Repository
//!
//! Implements BackendRepository with a single mutex around entries and
//! counters. Nothing survives a restart; used by tests and by
//! `SPEEDBALANCER_STORAGE=memory`.

use crate::domain::entities::{BackendEntry, RegistrySnapshot};
use crate::domain::errors::RegistryError;
use crate::domain::ports::BackendRepository;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct Registry {
    /// Entries in insertion order, unique by url
    entries: Vec<BackendEntry>,
    /// Request counters keyed by url
    counts: HashMap<String, u64>,
}

impl Registry {
    fn position(&self, url: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.url == url)
    }

    fn remove(&mut self, url: &str) {
        if let Some(idx) = self.position(url) {
            self.entries.remove(idx);
        }
        self.counts.remove(url);
    }
}

/// Mutex-guarded in-memory registry.
///
/// Every operation takes the lock once, so renames and evictions are
/// never observed half-applied.
pub struct MemoryBackendRepository {
    inner: Mutex<Registry>,
}

impl MemoryBackendRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Registry::default()),
        }
    }

    /// Create a repository holding `entries`, each with a zeroed counter.
    pub fn with_entries(entries: Vec<BackendEntry>) -> Self {
        let repo = Self::new();
        {
            let mut reg = repo.inner.lock();
            for entry in entries {
                reg.counts.entry(entry.url.clone()).or_insert(0);
                match reg.position(&entry.url) {
                    Some(idx) => reg.entries[idx] = entry,
                    None => reg.entries.push(entry),
                }
            }
        }
        repo
    }

    /// Number of entries currently registered.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryBackendRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendRepository for MemoryBackendRepository {
    async fn list(&self) -> Result<Vec<BackendEntry>, RegistryError> {
        Ok(self.inner.lock().entries.clone())
    }

    async fn upsert(
        &self,
        entry: BackendEntry,
        old_url: Option<&str>,
    ) -> Result<(), RegistryError> {
        entry.validate()?;

        let mut reg = self.inner.lock();

        // A rename keeps the old slot so the entry does not change position
        let mut slot = None;
        if let Some(old) = old_url.filter(|old| *old != entry.url) {
            slot = reg.position(old);
            reg.remove(old);
        }

        reg.counts.entry(entry.url.clone()).or_insert(0);
        match reg.position(&entry.url) {
            Some(idx) => reg.entries[idx] = entry,
            None => match slot {
                Some(idx) if idx <= reg.entries.len() => reg.entries.insert(idx, entry),
                _ => reg.entries.push(entry),
            },
        }
        Ok(())
    }

    async fn delete(&self, url: &str) -> Result<(), RegistryError> {
        self.inner.lock().remove(url);
        Ok(())
    }

    async fn increment_count(&self, url: &str) -> Result<(), RegistryError> {
        if let Some(count) = self.inner.lock().counts.get_mut(url) {
            *count += 1;
        }
        Ok(())
    }

    async fn snapshot(&self) -> Result<RegistrySnapshot, RegistryError> {
        let reg = self.inner.lock();
        Ok(RegistrySnapshot {
            entries: reg.entries.clone(),
            counts: reg.counts.clone(),
        })
    }

    async fn seed(&self, defaults: &[BackendEntry]) -> Result<usize, RegistryError> {
        let mut reg = self.inner.lock();
        let mut inserted = 0;
        for entry in defaults {
            entry.validate()?;
            if reg.position(&entry.url).is_none() {
                reg.entries.push(entry.clone());
                inserted += 1;
            }
            reg.counts.entry(entry.url.clone()).or_insert(0);
        }
        Ok(inserted)
    }
}
