//! Admin API Server
//!
//! HTTP API for operators to inspect and edit the backend registry and
//! read per-backend request counters. Also serves the dashboard page.

use crate::domain::entities::BackendEntry;
use crate::domain::errors::RegistryError;
use crate::domain::ports::BackendRepository;
use crate::infrastructure::eviction_log::EvictionLog;
use crate::infrastructure::shutdown::ShutdownController;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

const DASHBOARD_HTML: &str = include_str!("../../../assets/dashboard.html");

/// Create-or-update request. Missing fields default to empty/zero and
/// then fail validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpsertRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub weight: i64,
    /// Previous url when the entry is being renamed
    #[serde(default, rename = "oldUrl")]
    pub old_url: Option<String>,
}

/// Delete request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub url: String,
}

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub backends: usize,
}

/// API Server state.
#[derive(Clone)]
pub struct ApiState {
    pub backend_repo: Arc<dyn BackendRepository>,
    pub evictions: Arc<EvictionLog>,
}

impl ApiState {
    pub fn new(backend_repo: Arc<dyn BackendRepository>, evictions: Arc<EvictionLog>) -> Self {
        Self {
            backend_repo,
            evictions,
        }
    }
}

/// API Server for registry administration.
pub struct ApiServer {
    listen_addr: String,
    state: ApiState,
}

impl ApiServer {
    pub fn new(listen_addr: String, state: ApiState) -> Self {
        Self { listen_addr, state }
    }

    /// Get shared state for use by other components.
    pub fn state(&self) -> ApiState {
        self.state.clone()
    }

    pub fn router(&self) -> Router {
        Router::new()
            // Dashboard
            .route("/", get(dashboard_handler))
            // Health endpoint
            .route("/health", get(health_handler))
            // Registry
            .route(
                "/backends",
                get(list_backends_handler)
                    .post(upsert_backend_handler)
                    .delete(delete_backend_handler),
            )
            // Counters
            .route("/metrics", get(metrics_handler))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Run the API server until `shutdown` fires.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run(&self, shutdown: ShutdownController) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.listen_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` fires.
    pub async fn serve(&self, listener: TcpListener, shutdown: ShutdownController) -> anyhow::Result<()> {
        tracing::info!("admin API listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        tracing::info!("admin API stopped");
        Ok(())
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        match self {
            RegistryError::InvalidEntry(_) => error_response(StatusCode::BAD_REQUEST, self.to_string()),
            RegistryError::Storage(_) => {
                tracing::error!("admin request failed: {}", self);
                error_response(StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        }
    }
}

// Handler functions

async fn dashboard_handler() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

async fn health_handler(State(state): State<ApiState>) -> Response {
    match state.backend_repo.list().await {
        Ok(entries) => Json(HealthResponse {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            backends: entries.len(),
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn list_backends_handler(State(state): State<ApiState>) -> Response {
    match state.backend_repo.list().await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn upsert_backend_handler(
    State(state): State<ApiState>,
    payload: Result<Json<UpsertRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(req) => req,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let entry = match BackendEntry::new(req.name, req.url, req.weight) {
        Ok(entry) => entry,
        Err(e) => return e.into_response(),
    };
    let old_url = req.old_url.filter(|old| !old.is_empty());

    if let Err(e) = state.backend_repo.upsert(entry.clone(), old_url.as_deref()).await {
        return e.into_response();
    }

    state.evictions.forget(&entry.url);
    match old_url {
        Some(old) if old != entry.url => {
            state.evictions.forget(&old);
            tracing::info!("renamed backend {} -> {} (weight={})", old, entry.url, entry.weight);
        }
        _ => tracing::info!("saved backend {} (weight={})", entry.url, entry.weight),
    }

    StatusCode::NO_CONTENT.into_response()
}

async fn delete_backend_handler(
    State(state): State<ApiState>,
    payload: Result<Json<DeleteRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(req) => req,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    if let Err(e) = state.backend_repo.delete(&req.url).await {
        return e.into_response();
    }
    state.evictions.forget(&req.url);
    tracing::info!("deleted backend {}", req.url);

    StatusCode::NO_CONTENT.into_response()
}

async fn metrics_handler(State(state): State<ApiState>) -> Response {
    match state.backend_repo.counts().await {
        Ok(counts) => Json(counts).into_response(),
        Err(e) => e.into_response(),
    }
}
