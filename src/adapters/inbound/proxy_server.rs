//! HTTP Proxy Server Adapter
//!
//! Accepts client HTTP requests on every path and hands them to the
//! application service layer, which relays or redirects them.

use crate::application::{ProxyResponse, ProxyService};
use crate::infrastructure::shutdown::ShutdownController;
use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Method, Uri},
    response::Response,
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Proxy Server - inbound adapter for client traffic.
///
/// This adapter:
/// 1. Accepts HTTP requests on any path
/// 2. Rejects every method except GET with 501
/// 3. Uses ProxyService to relay the request or redirect the client
pub struct ProxyServer {
    proxy_service: Arc<ProxyService>,
    listen_addr: String,
}

impl ProxyServer {
    /// Create a new proxy server.
    pub fn new(proxy_service: Arc<ProxyService>, listen_addr: String) -> Self {
        Self {
            proxy_service,
            listen_addr,
        }
    }

    /// Build the router. Every path falls through to the proxy handler.
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .layer(TraceLayer::new_for_http())
            .with_state(self.proxy_service.clone())
    }

    /// Bind the configured address and serve until `shutdown` fires.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run(&self, shutdown: ShutdownController) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.listen_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` fires.
    pub async fn serve(&self, listener: TcpListener, shutdown: ShutdownController) -> anyhow::Result<()> {
        tracing::info!(
            "speedbalancer proxy listening on {} (mode={})",
            listener.local_addr()?,
            self.proxy_service.mode()
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        tracing::info!("proxy listener stopped");
        Ok(())
    }
}

async fn proxy_handler(
    State(service): State<Arc<ProxyService>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if method != Method::GET {
        tracing::debug!("rejecting {} {}", method, uri);
        return into_response(ProxyResponse::not_implemented());
    }

    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    into_response(service.handle(path, &headers).await)
}

fn into_response(proxied: ProxyResponse) -> Response {
    let mut response = Response::new(Body::from(proxied.body));
    *response.status_mut() = proxied.status;
    *response.headers_mut() = proxied.headers;
    response
}
