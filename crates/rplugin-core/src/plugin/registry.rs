//! Plugin store registry
//!
//! Fetches `plugins.json` from several mirrors at once and keeps the first
//! valid answer for the lifetime of the client.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use reqwest::Client;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::config::RegistryConfig;
use crate::error::{Result, RpluginError};
use crate::plugin::types::Plugin;

/// Plugin Registry - catalog of store plugins
pub struct RegistryClient {
    http: Client,
    mirrors: Vec<String>,
    /// Upper bound on concurrent mirror requests
    max_workers: usize,
    catalog: OnceCell<Arc<Vec<Plugin>>>,
}

impl RegistryClient {
    /// Create a new RegistryClient over the given mirrors
    pub fn new(http: Client, mirrors: Vec<String>) -> Self {
        Self {
            http,
            mirrors,
            max_workers: 5,
            catalog: OnceCell::new(),
        }
    }

    pub fn from_config(http: Client, config: &RegistryConfig) -> Self {
        Self::new(http, config.mirrors.clone()).with_max_workers(config.max_workers)
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub fn mirrors(&self) -> &[String] {
        &self.mirrors
    }

    /// Get the plugin catalog.
    ///
    /// The first successful fetch is cached; later calls return the same
    /// `Arc` without touching the network. Failures are not cached.
    pub async fn get_plugins(&self) -> Result<Arc<Vec<Plugin>>> {
        if self.catalog.initialized() {
            debug!("plugin catalog served from cache");
        }
        let catalog = self
            .catalog
            .get_or_try_init(|| self.fetch_from_mirrors())
            .await?;
        Ok(Arc::clone(catalog))
    }

    /// Race all mirrors; the first decodable payload wins and the rest are dropped.
    async fn fetch_from_mirrors(&self) -> Result<Arc<Vec<Plugin>>> {
        let mut responses = stream::iter(self.mirrors.iter())
            .map(|url| async move { (url, self.fetch_mirror(url).await) })
            .buffer_unordered(self.max_workers);

        let mut errors = Vec::with_capacity(self.mirrors.len());
        while let Some((url, result)) = responses.next().await {
            match result {
                Ok(plugins) => {
                    debug!(mirror = %url, count = plugins.len(), "plugin catalog loaded");
                    return Ok(Arc::new(plugins));
                }
                Err(e) => {
                    warn!(mirror = %url, error = %e, "plugin mirror failed");
                    errors.push(e);
                }
            }
        }

        Err(RpluginError::CatalogUnavailable { errors })
    }

    async fn fetch_mirror(&self, url: &str) -> Result<Vec<Plugin>> {
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpluginError::MirrorStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let plugins: Vec<Plugin> = serde_json::from_slice(&body)?;
        Ok(plugins)
    }
}
