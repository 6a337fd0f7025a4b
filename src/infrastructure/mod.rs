//! Infrastructure Layer
//!
//! Background tasks and process-wide concerns.

pub mod eviction_log;
pub mod health_checker;
pub mod shutdown;

pub use eviction_log::{EvictedBackend, EvictionLog};
pub use health_checker::{CycleReport, HealthCheckConfig, HealthCheckResult, HealthChecker};
pub use shutdown::{shutdown_signal, ShutdownController};
