//! Adapters Layer
//!
//! Inbound adapters drive the application (HTTP listeners); outbound
//! adapters implement the domain ports (registry storage).

pub mod inbound;
pub mod outbound;
