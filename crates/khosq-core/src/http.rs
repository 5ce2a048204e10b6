//! Global HTTP client singleton
//!
//! Provides a shared HTTP client instance to avoid recreating clients for
//! each provider call. This eliminates the TLS handshake overhead and root
//! certificate store population that happens when creating a new client.

use anyhow::{Context, Result};
use std::sync::OnceLock;

use crate::provider::DEFAULT_TIMEOUT_SECS;

/// Global HTTP client instance
static HTTP_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get the global HTTP client, creating it if necessary.
pub fn get_http_client() -> Result<&'static reqwest::Client> {
    // Fast path
    if let Some(client) = HTTP_CLIENT.get() {
        return Ok(client);
    }

    let client = create_http_client()?;

    // get_or_init handles the race where multiple tasks initialize at once
    Ok(HTTP_CLIENT.get_or_init(|| client))
}

/// Pre-warm the HTTP client during process startup.
pub fn warmup_http_client() -> Result<()> {
    get_http_client()?;
    Ok(())
}

fn create_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .context("Failed to create HTTP client")
}
