//! Active Health Checker
//!
//! Periodically probes every registered backend with an HTTP GET against
//! its base URL and evicts the ones that do not answer.

use crate::domain::entities::BackendEntry;
use crate::domain::errors::ProbeError;
use crate::domain::ports::BackendRepository;
use crate::infrastructure::eviction_log::EvictionLog;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Health check configuration.
#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    /// Interval between health check cycles
    pub interval: Duration,
    /// Timeout for each probe
    pub timeout: Duration,
    /// Re-insert evicted backends once they answer again
    pub restore_evicted: bool,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(2),
            restore_evicted: false,
        }
    }
}

/// Result of a single probe.
#[derive(Debug, Clone)]
pub enum HealthCheckResult {
    Reachable { latency_ms: u64, status: u16 },
    Unreachable { error: ProbeError, latency_ms: u64 },
}

impl HealthCheckResult {
    pub fn is_success(&self) -> bool {
        matches!(self, HealthCheckResult::Reachable { .. })
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Registered backends probed
    pub probed: usize,
    /// Backends removed from the registry
    pub evicted: Vec<String>,
    /// Previously evicted backends put back
    pub restored: Vec<String>,
}

/// Active health checker for the backend registry.
pub struct HealthChecker {
    config: HealthCheckConfig,
    client: reqwest::Client,
    evictions: Arc<EvictionLog>,
}

impl HealthChecker {
    /// Create a new health checker.
    pub fn new(config: HealthCheckConfig, evictions: Arc<EvictionLog>) -> anyhow::Result<Self> {
        // A redirect is an answer; its target is not ours to check
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            config,
            client,
            evictions,
        })
    }

    pub fn config(&self) -> &HealthCheckConfig {
        &self.config
    }

    /// Start the health check loop.
    ///
    /// The loop never ends; a failing cycle is logged and the next one
    /// runs on schedule.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub fn start(self: Arc<Self>, backend_repo: Arc<dyn BackendRepository>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                let report = self.run_cycle(backend_repo.as_ref()).await;
                tracing::debug!(
                    "health cycle: probed={} evicted={} restored={}",
                    report.probed,
                    report.evicted.len(),
                    report.restored.len()
                );
            }
        })
    }

    /// Probe every registered backend once and apply the outcome.
    ///
    /// Probes run without holding any registry lock; only the eviction
    /// or restore itself touches the registry.
    pub async fn run_cycle(&self, backend_repo: &dyn BackendRepository) -> CycleReport {
        let mut report = CycleReport::default();

        let entries = match backend_repo.list().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("health check skipped, cannot read registry: {}", e);
                return report;
            }
        };

        for entry in &entries {
            report.probed += 1;
            match self.probe(&entry.url).await {
                HealthCheckResult::Reachable { .. } => {}
                HealthCheckResult::Unreachable { error, .. } => {
                    if self.evict(backend_repo, entry, &error).await {
                        report.evicted.push(entry.url.clone());
                    }
                }
            }
        }

        if self.config.restore_evicted {
            report.restored = self.restore_reachable(backend_repo, &report.evicted).await;
        }

        report
    }

    async fn evict(
        &self,
        backend_repo: &dyn BackendRepository,
        entry: &BackendEntry,
        error: &ProbeError,
    ) -> bool {
        tracing::warn!("backend {} ({}) failed probe, evicting: {}", entry.name, entry.url, error);
        match backend_repo.delete(&entry.url).await {
            Ok(()) => {
                self.evictions.record(entry.clone(), error.to_string());
                true
            }
            Err(e) => {
                tracing::error!("failed to evict {}: {}", entry.url, e);
                false
            }
        }
    }

    /// Probe evicted backends that are not registered and put back the ones
    /// that answer, with their original name and weight.
    ///
    /// Backends evicted by this same cycle (`just_evicted`) are left for the
    /// next one.
    async fn restore_reachable(
        &self,
        backend_repo: &dyn BackendRepository,
        just_evicted: &[String],
    ) -> Vec<String> {
        let mut restored = Vec::new();

        // Read after the evictions, so they no longer look registered
        let registered = match backend_repo.list().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("restore skipped, cannot read registry: {}", e);
                return restored;
            }
        };

        for evicted in self.evictions.all() {
            let url = evicted.entry.url.clone();
            if just_evicted.contains(&url) {
                continue;
            }
            if registered.iter().any(|e| e.url == url) {
                // Re-added by an operator in the meantime
                self.evictions.forget(&url);
                continue;
            }
            if !self.probe(&url).await.is_success() {
                continue;
            }
            match backend_repo.upsert(evicted.entry.clone(), None).await {
                Ok(()) => {
                    self.evictions.forget(&url);
                    tracing::info!(
                        "backend {} ({}) reachable again, restored with weight {}",
                        evicted.entry.name,
                        url,
                        evicted.entry.weight
                    );
                    restored.push(url);
                }
                Err(e) => tracing::error!("failed to restore {}: {}", url, e),
            }
        }

        restored
    }

    /// Issue a GET against `url`. Any HTTP response counts as reachable.
    pub async fn probe(&self, url: &str) -> HealthCheckResult {
        let start = Instant::now();
        let result = self.client.get(url).send().await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(resp) => HealthCheckResult::Reachable {
                latency_ms,
                status: resp.status().as_u16(),
            },
            Err(e) => HealthCheckResult::Unreachable {
                error: ProbeError::from_reqwest(e, self.config.timeout),
                latency_ms,
            },
        }
    }
}
