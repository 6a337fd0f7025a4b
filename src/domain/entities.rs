//! Domain Entities - Core business objects
//!
//! A backend is identified by its base URL. The registry keeps one
//! `BackendEntry` and one request counter per URL.

use crate::domain::errors::RegistryError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An upstream server eligible to receive forwarded requests.
///
/// Construct through [`BackendEntry::new`] so that `weight >= 1` and a
/// non-empty `url` always hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendEntry {
    /// Human-readable label
    pub name: String,
    /// Base URL, primary key of the registry
    pub url: String,
    /// Relative selection weight
    pub weight: u32,
}

impl BackendEntry {
    /// Validate and build an entry.
    ///
    /// `weight` is taken as `i64` so callers can pass raw user input;
    /// anything below 1 or above `u32::MAX` is rejected.
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        weight: i64,
    ) -> Result<Self, RegistryError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(RegistryError::InvalidEntry("url must not be empty".to_string()));
        }
        if weight < 1 {
            return Err(RegistryError::InvalidEntry(format!(
                "weight must be >= 1, got {}",
                weight
            )));
        }
        let weight = u32::try_from(weight).map_err(|_| {
            RegistryError::InvalidEntry(format!("weight {} is out of range", weight))
        })?;

        Ok(Self {
            name: name.into(),
            url,
            weight,
        })
    }

    /// Re-check the invariants of an entry that may have been built by hand.
    pub fn validate(&self) -> Result<(), RegistryError> {
        Self::new(self.name.clone(), self.url.clone(), i64::from(self.weight)).map(|_| ())
    }
}

/// Consistent point-in-time view of the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    /// Entries in registry order
    pub entries: Vec<BackendEntry>,
    /// Request counters keyed by url
    pub counts: HashMap<String, u64>,
}

impl RegistrySnapshot {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_for(&self, url: &str) -> u64 {
        self.counts.get(url).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_entry_new() {
        let entry = BackendEntry::new("web1", "http://10.0.0.1", 70).unwrap();
        assert_eq!(entry.name, "web1");
        assert_eq!(entry.url, "http://10.0.0.1");
        assert_eq!(entry.weight, 70);
    }

    #[test]
    fn test_backend_entry_rejects_zero_weight() {
        let result = BackendEntry::new("web1", "http://10.0.0.1", 0);
        assert!(matches!(result, Err(RegistryError::InvalidEntry(_))));
    }

    #[test]
    fn test_backend_entry_rejects_negative_weight() {
        let result = BackendEntry::new("web1", "http://10.0.0.1", -5);
        assert!(matches!(result, Err(RegistryError::InvalidEntry(_))));
    }

    #[test]
    fn test_backend_entry_rejects_empty_url() {
        assert!(BackendEntry::new("web1", "", 1).is_err());
        assert!(BackendEntry::new("web1", "   ", 1).is_err());
    }

    #[test]
    fn test_backend_entry_rejects_huge_weight() {
        let result = BackendEntry::new("web1", "http://x", i64::from(u32::MAX) + 1);
        assert!(matches!(result, Err(RegistryError::InvalidEntry(_))));
    }

    #[test]
    fn test_backend_entry_allows_empty_name() {
        let entry = BackendEntry::new("", "http://x", 1).unwrap();
        assert!(entry.name.is_empty());
    }

    #[test]
    fn test_validate_hand_built_entry() {
        let entry = BackendEntry {
            name: "x".to_string(),
            url: "http://x".to_string(),
            weight: 0,
        };
        assert!(entry.validate().is_err());
    }

    #[test]
    fn test_backend_entry_serializes_to_admin_shape() {
        let entry = BackendEntry::new("C", "http://x", 10).unwrap();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "C", "url": "http://x", "weight": 10})
        );
    }

    #[test]
    fn test_snapshot_count_for_missing_url() {
        let snapshot = RegistrySnapshot::default();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.count_for("http://nowhere"), 0);
    }
}
