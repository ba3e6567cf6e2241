use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;

const REQUEST_TIMEOUT_SECS: u64 = 15;

static CLIENT: OnceCell<Client> = OnceCell::new();

/// Shared blocking client; odds lookups are the only network traffic and a
/// single pooled client with a hard timeout is enough.
pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("buli_edge/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build http client")
    })
}
