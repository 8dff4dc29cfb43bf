//! Shared HTTP client configuration.
//!
//! Provides pre-configured `reqwest::Client` builders with the timeouts
//! spec'd for each outbound collaborator, so connection pooling and timeout
//! behavior stay consistent across the catalog gateway, the generative-text
//! gateway, and the notification channels.

use std::time::Duration;

/// Connect timeout in seconds, shared by every profile.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Per-call timeout for the catalog gateway (spec §5).
pub const CATALOG_TIMEOUT_SECS: u64 = 10;

/// Per-call timeout for the generative-text gateway and messenger/email channels.
pub const GATEWAY_TIMEOUT_SECS: u64 = 60;

/// Builds an HTTP client for the product-search gateway.
pub fn catalog_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(CATALOG_TIMEOUT_SECS))
        .build()
        .expect("failed to build catalog HTTP client")
}

/// Builds an HTTP client for the generative-text gateway and notification channels.
pub fn gateway_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(GATEWAY_TIMEOUT_SECS))
        .build()
        .expect("failed to build gateway HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_client_builds() {
        drop(catalog_client());
    }

    #[test]
    fn gateway_client_builds() {
        drop(gateway_client());
    }
}
