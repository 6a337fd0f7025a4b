//! speedbalancer - Weighted HTTP load balancer with Hexagonal Architecture
//!
//! This is the composition root that wires together all the components.

use speedbalancer::adapters::inbound::{ApiServer, ApiState, ProxyServer};
use speedbalancer::adapters::outbound::{MemoryBackendRepository, SqliteBackendRepository};
use speedbalancer::config::load_config;
use speedbalancer::domain::ports::BackendRepository;
use speedbalancer::domain::value_objects::StorageKind;
use speedbalancer::infrastructure::{
    shutdown_signal, EvictionLog, HealthCheckConfig, HealthChecker, ShutdownController,
};
use speedbalancer::ProxyService;
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!(
        "starting speedbalancer listen={} api={} mode={} storage={}",
        cfg.listen_addr,
        cfg.api_listen_addr,
        cfg.mode,
        cfg.storage
    );

    // ===== COMPOSITION ROOT =====
    // Wire up all adapters and services

    // 1. Create outbound adapter (backend registry)
    let backend_repo: Arc<dyn BackendRepository> = match cfg.storage {
        StorageKind::Sqlite => {
            tracing::info!("registry stored in {}", cfg.db_path);
            Arc::new(SqliteBackendRepository::open(&cfg.db_path)?)
        }
        StorageKind::Memory => Arc::new(MemoryBackendRepository::new()),
    };

    let seeded = backend_repo.seed(&cfg.default_backends).await?;
    if seeded > 0 {
        tracing::info!("seeded {} default backends", seeded);
    }

    let evictions = Arc::new(EvictionLog::new());

    // 2. Start the health monitor
    let health_checker = Arc::new(HealthChecker::new(
        HealthCheckConfig {
            interval: cfg.health_interval(),
            timeout: cfg.probe_timeout(),
            restore_evicted: cfg.restore_evicted,
        },
        evictions.clone(),
    )?);
    let health_task = health_checker.start(backend_repo.clone());

    // 3. Create application service
    let proxy_service = Arc::new(ProxyService::new(
        backend_repo.clone(),
        evictions.clone(),
        cfg.mode,
        cfg.relay_timeout(),
    )?);

    // 4. Create inbound adapters and run until a shutdown signal
    let proxy_server = ProxyServer::new(proxy_service, cfg.listen_addr.clone());
    let api_server = ApiServer::new(
        cfg.api_listen_addr.clone(),
        ApiState::new(backend_repo, evictions),
    );

    let shutdown = ShutdownController::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let result = tokio::try_join!(
        proxy_server.run(shutdown.clone()),
        api_server.run(shutdown.clone())
    );

    health_task.abort();
    tracing::info!("speedbalancer stopped");
    result.map(|_| ())
}
