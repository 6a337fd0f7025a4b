//! Domain Errors
//!
//! Typed failures for the registry, the relay and the health probes.
//! None of these are fatal: callers convert them into an HTTP status,
//! an eviction, or a log line.

use std::time::Duration;

/// Errors returned by a `BackendRepository`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The entry violates `weight >= 1` or has an empty url.
    #[error("invalid backend entry: {0}")]
    InvalidEntry(String),
    /// The persistence layer failed.
    #[error("registry storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for RegistryError {
    fn from(e: rusqlite::Error) -> Self {
        RegistryError::Storage(e.to_string())
    }
}

impl From<tokio::task::JoinError> for RegistryError {
    fn from(e: tokio::task::JoinError) -> Self {
        RegistryError::Storage(format!("blocking task failed: {}", e))
    }
}

/// Why a forwarded request did not produce a response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayFailure {
    #[error("timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("failed reading response body: {0}")]
    Body(String),
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for RelayFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RelayFailure::Timeout
        } else if e.is_connect() {
            RelayFailure::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            RelayFailure::Body(e.to_string())
        } else {
            RelayFailure::Other(e.to_string())
        }
    }
}

/// Errors surfaced by the proxy use case.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProxyError {
    #[error("no backend available")]
    NoBackendAvailable,
    #[error("backend {url} unreachable: {source}")]
    BackendUnreachable {
        url: String,
        #[source]
        source: RelayFailure,
    },
}

/// Why a health probe failed. Every variant leads to the same eviction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection refused: {0}")]
    ConnectionRefused(String),
    #[error("probe failed: {0}")]
    Other(String),
}

impl ProbeError {
    /// Classify a reqwest error raised by a probe.
    pub fn from_reqwest(e: reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            ProbeError::Timeout(timeout)
        } else if e.is_connect() {
            ProbeError::ConnectionRefused(e.to_string())
        } else {
            ProbeError::Other(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::InvalidEntry("weight must be >= 1".to_string());
        assert_eq!(err.to_string(), "invalid backend entry: weight must be >= 1");
    }

    #[test]
    fn test_rusqlite_error_maps_to_storage() {
        let err: RegistryError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, RegistryError::Storage(_)));
    }

    #[test]
    fn test_proxy_error_display() {
        let err = ProxyError::BackendUnreachable {
            url: "http://a".to_string(),
            source: RelayFailure::Timeout,
        };
        assert_eq!(err.to_string(), "backend http://a unreachable: timed out");
        assert_eq!(ProxyError::NoBackendAvailable.to_string(), "no backend available");
    }

    #[test]
    fn test_probe_error_display() {
        let err = ProbeError::Timeout(Duration::from_secs(2));
        assert!(err.to_string().contains("2s"));
    }
}
