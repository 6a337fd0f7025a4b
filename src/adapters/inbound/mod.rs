mod api_server;
mod proxy_server;

pub use api_server::{ApiServer, ApiState};
pub use proxy_server::ProxyServer;

// Re-export for external use (e.g., integration tests)
#[allow(unused_imports)]
pub use api_server::{DeleteRequest, HealthResponse, UpsertRequest};
