//! Proxy Service - Main application use case
//!
//! Orchestrates one inbound request: selecting a backend from the
//! registry, counting the dispatch, relaying (or redirecting) and
//! evicting the backend when it cannot be reached. This is the primary
//! interface for the proxy listener.

use crate::domain::entities::BackendEntry;
use crate::domain::errors::{ProxyError, RelayFailure};
use crate::domain::ports::BackendRepository;
use crate::domain::services::Selector;
use crate::domain::value_objects::ProxyMode;
use crate::infrastructure::eviction_log::EvictionLog;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Response headers never copied from a backend. The body is buffered and
/// re-framed with an exact `Content-Length`, so transport framing and
/// hop-by-hop headers from upstream do not apply.
pub const STRIPPED_RESPONSE_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "upgrade",
    "content-length",
    "content-encoding",
    "transfer-encoding",
];

/// Source of the current second-of-minute.
pub type SecondClock = Arc<dyn Fn() -> u32 + Send + Sync>;

/// Current wall-clock second of the minute (0-59).
pub fn current_second_of_minute() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| (d.as_secs() % 60) as u32)
        .unwrap_or(0)
}

/// Copy `headers` without the ones in [`STRIPPED_RESPONSE_HEADERS`].
pub fn sanitize_response_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !STRIPPED_RESPONSE_HEADERS.contains(&name.as_str()) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

/// A complete response for the inbound caller.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyResponse {
    /// Build a response whose `Content-Length` matches `body` exactly.
    pub fn new(status: StatusCode, mut headers: HeaderMap, body: Bytes) -> Self {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        Self {
            status,
            headers,
            body,
        }
    }

    fn plain_text(status: StatusCode, text: &'static str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        Self::new(status, headers, Bytes::from_static(text.as_bytes()))
    }

    pub fn service_unavailable() -> Self {
        Self::plain_text(StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable")
    }

    pub fn bad_gateway() -> Self {
        Self::plain_text(StatusCode::BAD_GATEWAY, "Bad Gateway")
    }

    pub fn not_implemented() -> Self {
        Self::plain_text(StatusCode::NOT_IMPLEMENTED, "Not Implemented")
    }
}

/// Proxy service - main application use case.
///
/// This service orchestrates one request:
/// 1. Reads a registry snapshot and picks a backend with the [`Selector`]
/// 2. Increments the backend's counter (dispatch, not confirmed success)
/// 3. Relays the request or answers with a redirect
/// 4. Evicts the backend if the relay fails at the transport level
pub struct ProxyService {
    backend_repo: Arc<dyn BackendRepository>,
    evictions: Arc<EvictionLog>,
    client: reqwest::Client,
    mode: ProxyMode,
    clock: SecondClock,
}

impl ProxyService {
    /// Create a new proxy service.
    pub fn new(
        backend_repo: Arc<dyn BackendRepository>,
        evictions: Arc<EvictionLog>,
        mode: ProxyMode,
        relay_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(relay_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            backend_repo,
            evictions,
            client,
            mode,
            clock: Arc::new(current_second_of_minute),
        })
    }

    /// Replace the wall clock used for the prime-second override.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> u32 + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn mode(&self) -> ProxyMode {
        self.mode
    }

    /// Serve one inbound GET end to end.
    ///
    /// Never fails: every error is turned into a 502/503 response.
    pub async fn handle(&self, path: &str, headers: &HeaderMap) -> ProxyResponse {
        let backend = match self.select(path).await {
            Ok(backend) => backend,
            Err(e) => {
                tracing::warn!("{} for {}", e, path);
                return ProxyResponse::service_unavailable();
            }
        };

        match self.mode {
            ProxyMode::Redirect => Self::redirect(&backend.url, path),
            ProxyMode::Proxy => match self.relay(&backend, path, headers).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("relay failed: {}", e);
                    ProxyResponse::bad_gateway()
                }
            },
        }
    }

    /// Choose the backend for `path` and count the dispatch.
    pub async fn select(&self, path: &str) -> Result<BackendEntry, ProxyError> {
        let snapshot = self.backend_repo.snapshot().await.map_err(|e| {
            tracing::error!("cannot read registry: {}", e);
            ProxyError::NoBackendAvailable
        })?;

        let second = (self.clock)();
        let url = Selector::pick_backend(&snapshot.entries, path, second, &mut rand::thread_rng())
            .ok_or(ProxyError::NoBackendAvailable)?;

        let backend = snapshot
            .entries
            .into_iter()
            .find(|e| e.url == url)
            .ok_or(ProxyError::NoBackendAvailable)?;

        if let Err(e) = self.backend_repo.increment_count(&backend.url).await {
            tracing::error!("failed to count request for {}: {}", backend.url, e);
        }

        tracing::debug!("selected {} for {} (second={})", backend.url, path, second);
        Ok(backend)
    }

    /// Forward a GET for `path` to `backend` and buffer its response.
    ///
    /// On any transport failure the backend is evicted from the registry
    /// before the error is returned.
    pub async fn relay(
        &self,
        backend: &BackendEntry,
        path: &str,
        headers: &HeaderMap,
    ) -> Result<ProxyResponse, ProxyError> {
        let target = format!("{}{}", backend.url, path);

        match self.forward(&target, headers).await {
            Ok(response) => Ok(response),
            Err(failure) => {
                self.evict(backend, &failure).await;
                Err(ProxyError::BackendUnreachable {
                    url: backend.url.clone(),
                    source: failure,
                })
            }
        }
    }

    async fn forward(&self, target: &str, headers: &HeaderMap) -> Result<ProxyResponse, RelayFailure> {
        let resp = self
            .client
            .get(target)
            .headers(headers.clone())
            .send()
            .await?;

        let status = resp.status();
        let headers = sanitize_response_headers(resp.headers());
        let body = resp.bytes().await?;

        Ok(ProxyResponse::new(status, headers, body))
    }

    /// Answer with a 302 pointing the caller at the backend.
    pub fn redirect(backend_url: &str, path: &str) -> ProxyResponse {
        let target = format!("{}{}", backend_url, path);
        match HeaderValue::from_str(&target) {
            Ok(location) => {
                let mut headers = HeaderMap::new();
                headers.insert(header::LOCATION, location);
                ProxyResponse::new(StatusCode::FOUND, headers, Bytes::new())
            }
            Err(_) => {
                tracing::error!("cannot redirect to invalid location {:?}", target);
                ProxyResponse::bad_gateway()
            }
        }
    }

    /// Remove an unreachable backend and its counter from the registry.
    async fn evict(&self, backend: &BackendEntry, failure: &RelayFailure) {
        tracing::warn!("evicting backend {} after relay failure: {}", backend.url, failure);
        match self.backend_repo.delete(&backend.url).await {
            Ok(()) => self.evictions.record(backend.clone(), failure.to_string()),
            Err(e) => tracing::error!("failed to evict {}: {}", backend.url, e),
        }
    }
}
