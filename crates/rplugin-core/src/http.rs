//! Shared HTTP client construction

use std::time::Duration;

use reqwest::Client;

use crate::error::Result;

const USER_AGENT: &str = concat!("nb-rplugin/", env!("CARGO_PKG_VERSION"));

/// Build the client shared by the catalog and package index lookups.
///
/// GitHub rejects requests without a `User-Agent`, so one is always set.
pub fn build_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()?;
    Ok(client)
}
