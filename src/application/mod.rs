//! Application Layer
//!
//! Use cases that orchestrate the domain through its ports.

mod proxy_service;

pub use proxy_service::{
    current_second_of_minute, sanitize_response_headers, ProxyResponse, ProxyService, SecondClock,
    STRIPPED_RESPONSE_HEADERS,
};
