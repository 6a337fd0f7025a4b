//! Backend Repository Port
//!
//! Defines the interface of the backend registry: entries keyed by url
//! plus one request counter per entry. Implementations may keep the
//! registry in memory or persist it (SQLite).

use crate::domain::entities::{BackendEntry, RegistrySnapshot};
use crate::domain::errors::RegistryError;
use async_trait::async_trait;
use std::collections::HashMap;

/// Registry of backends and their request counters.
///
/// This is an outbound port. Every method is one logical operation and
/// implementations must serialize them against each other so that no
/// caller ever observes a half-applied rename or eviction.
#[async_trait]
pub trait BackendRepository: Send + Sync {
    /// All entries, in registry order.
    async fn list(&self) -> Result<Vec<BackendEntry>, RegistryError>;

    /// Insert or replace `entry`, keyed by its url.
    ///
    /// When `old_url` is given and differs from `entry.url`, the entry and
    /// counter stored under `old_url` are removed in the same operation.
    /// A zeroed counter is created for `entry.url` if none exists.
    async fn upsert(&self, entry: BackendEntry, old_url: Option<&str>)
        -> Result<(), RegistryError>;

    /// Remove the entry and its counter. Absent urls are not an error.
    async fn delete(&self, url: &str) -> Result<(), RegistryError>;

    /// Add one to the counter of `url`. No-op if there is no counter.
    async fn increment_count(&self, url: &str) -> Result<(), RegistryError>;

    /// Entries and counters read together.
    async fn snapshot(&self) -> Result<RegistrySnapshot, RegistryError>;

    /// All counters keyed by url.
    async fn counts(&self) -> Result<HashMap<String, u64>, RegistryError> {
        Ok(self.snapshot().await?.counts)
    }

    /// Insert each default entry (and a zeroed counter) unless its url is
    /// already present. Existing rows are never overwritten.
    async fn seed(&self, defaults: &[BackendEntry]) -> Result<usize, RegistryError>;
}
