//! HTTP client factory with consistent timeout configuration.
//!
//! Every outbound integration (Stripe, Resend, Twilio, Google) builds its
//! client here rather than constructing `reqwest::Client` directly.

use reqwest::Client;
use std::time::Duration;

use super::InfraError;

/// TCP handshake + TLS.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Total request/response time. External APIs are expected to answer
/// within seconds.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub fn build_client() -> Result<Client, InfraError> {
    Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()
        .map_err(InfraError::HttpClient)
}
