//! speedbalancer Library
//!
//! This module exposes the speedbalancer components for use in integration
//! tests and as a library.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use application::{ProxyResponse, ProxyService};
pub use config::load_config;
pub use domain::entities::{BackendEntry, RegistrySnapshot};
pub use domain::errors::{ProbeError, ProxyError, RegistryError, RelayFailure};
pub use domain::ports::BackendRepository;
pub use domain::services::Selector;
pub use domain::value_objects::{ProxyMode, StorageKind};
