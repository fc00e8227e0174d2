//! Package index client
//!
//! Per-package metadata from PyPI's JSON API, cached for the lifetime of the
//! client, plus best-effort repository statistics from GitHub.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::IndexConfig;
use crate::config::{DEFAULT_GITHUB_API_URL, DEFAULT_PYPI_URL};
use crate::error::{Result, RpluginError};
use crate::plugin::types::{PackageMetadata, RepoStatistics};

type MetadataCell = Arc<OnceCell<Arc<PackageMetadata>>>;

#[derive(Deserialize)]
struct IndexResponse {
    info: PackageMetadata,
}

#[derive(Deserialize)]
struct GitHubError {
    message: String,
}

pub struct PackageIndexClient {
    http: Client,
    pypi_url: String,
    github_api_url: String,
    retry_backoff: Duration,
    /// One cell per package; a cell stays empty until a fetch succeeds
    metadata: Mutex<HashMap<String, MetadataCell>>,
}

impl PackageIndexClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            pypi_url: DEFAULT_PYPI_URL.to_string(),
            github_api_url: DEFAULT_GITHUB_API_URL.to_string(),
            retry_backoff: Duration::ZERO,
            metadata: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(http: Client, config: &IndexConfig) -> Self {
        Self::new(http)
            .with_pypi_url(&config.pypi_url)
            .with_github_api_url(&config.github_api_url)
            .with_retry_backoff(config.retry_backoff())
    }

    pub fn with_pypi_url(mut self, url: &str) -> Self {
        self.pypi_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_github_api_url(mut self, url: &str) -> Self {
        self.github_api_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Base delay between retries; attempt `n` waits `n * backoff`
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    fn cell(&self, package: &str) -> MetadataCell {
        let mut metadata = self.metadata.lock();
        Arc::clone(metadata.entry(package.to_string()).or_default())
    }

    /// Get package metadata, fetching it on first use.
    ///
    /// Concurrent callers for the same package share one request.
    pub async fn get_package_metadata(&self, package: &str) -> Result<Arc<PackageMetadata>> {
        let cell = self.cell(package);
        if cell.initialized() {
            debug!(package, "package metadata served from cache");
        }

        let metadata = cell
            .get_or_try_init(|| self.fetch_package_metadata(package))
            .await?;
        Ok(Arc::clone(metadata))
    }

    /// Like [`Self::get_package_metadata`], retrying failures other than
    /// `PackageNotFound` for at most `max_attempts` calls in total.
    pub async fn get_package_metadata_retry(
        &self,
        package: &str,
        max_attempts: u32,
    ) -> Result<Arc<PackageMetadata>> {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.get_package_metadata(package).await {
                Ok(metadata) => return Ok(metadata),
                Err(e) if !e.is_retryable() || attempt >= max_attempts => return Err(e),
                Err(e) => {
                    debug!(package, attempt, max_attempts, error = %e, "retrying package metadata");
                    if !self.retry_backoff.is_zero() {
                        tokio::time::sleep(self.retry_backoff * attempt).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn fetch_package_metadata(&self, package: &str) -> Result<Arc<PackageMetadata>> {
        let url = format!("{}/{}/json", self.pypi_url, package);
        let response = self.http.get(&url).send().await?;

        match response.status() {
            StatusCode::OK => {
                let body: IndexResponse = response.json().await?;
                debug!(package, version = %body.info.version, "package metadata fetched");
                Ok(Arc::new(body.info))
            }
            StatusCode::NOT_FOUND => Err(RpluginError::PackageNotFound {
                package: package.to_string(),
            }),
            status => Err(RpluginError::PackageFetch {
                package: package.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    /// Repository statistics for `owner/repo`
    pub async fn get_repo_statistics(&self, repo: &str) -> Result<RepoStatistics> {
        let url = format!("{}/repos/{}", self.github_api_url, repo);
        let response = self
            .http
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let message = match response.json::<GitHubError>().await {
                Ok(body) => body.message,
                Err(_) => status.canonical_reason().unwrap_or("unknown").to_string(),
            };
            return Err(RpluginError::RepoStats {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn index_body(version: &str, requires_dist: &[&str]) -> serde_json::Value {
        json!({
            "info": {
                "version": version,
                "requires_dist": requires_dist,
                "description": "# readme",
                "description_content_type": "text/markdown",
                "keywords": "nonebot",
                "requires_python": ">=3.9,<4.0"
            }
        })
    }

    fn create_test_client(server: &MockServer) -> PackageIndexClient {
        PackageIndexClient::new(Client::new())
            .with_pypi_url(&format!("{}/pypi", server.uri()))
            .with_github_api_url(&server.uri())
    }

    async fn request_count(server: &MockServer) -> usize {
        server.received_requests().await.unwrap_or_default().len()
    }

    #[tokio::test]
    async fn test_metadata_is_cached_per_package() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pypi/nonebot-plugin-status/json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(index_body("0.9.0", &["psutil>=5.7"])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server);
        let first = client
            .get_package_metadata("nonebot-plugin-status")
            .await
            .unwrap();
        let second = client
            .get_package_metadata("nonebot-plugin-status")
            .await
            .unwrap();

        assert_eq!(first.version, "0.9.0");
        assert_eq!(first.requires_dist, vec!["psutil>=5.7"]);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_concurrent_lookups_share_one_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pypi/nonebot2/json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(index_body("2.3.0", &[]))
                    .set_delay(Duration::from_millis(100)),
            )
            .mount(&server)
            .await;

        let client = create_test_client(&server);
        let (a, b) = tokio::join!(
            client.get_package_metadata("nonebot2"),
            client.get_package_metadata("nonebot2")
        );

        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(request_count(&server).await, 1);
    }

    #[tokio::test]
    async fn test_retry_succeeds_on_third_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pypi/flaky/json"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pypi/flaky/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(index_body("1.0.0", &[])))
            .mount(&server)
            .await;

        let client = create_test_client(&server);
        let metadata = client.get_package_metadata_retry("flaky", 3).await.unwrap();

        assert_eq!(metadata.version, "1.0.0");
        assert_eq!(request_count(&server).await, 3);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pypi/missing/json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = create_test_client(&server);
        let err = client
            .get_package_metadata_retry("missing", 5)
            .await
            .unwrap_err();

        assert!(matches!(err, RpluginError::PackageNotFound { .. }));
        assert_eq!(request_count(&server).await, 1);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pypi/down/json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = create_test_client(&server).with_retry_backoff(Duration::from_millis(1));
        let err = client.get_package_metadata_retry("down", 3).await.unwrap_err();

        assert!(matches!(
            err,
            RpluginError::PackageFetch { status: 500, .. }
        ));
        assert_eq!(request_count(&server).await, 3);
    }

    #[tokio::test]
    async fn test_repo_statistics() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/nonebot/nonebot2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "stargazers_count": 6000,
                "open_issues_count": 42,
                "forks_count": 500,
                "license": {"key": "mit", "name": "MIT License", "spdx_id": "MIT"}
            })))
            .mount(&server)
            .await;

        let client = create_test_client(&server);
        let stats = client.get_repo_statistics("nonebot/nonebot2").await.unwrap();

        assert_eq!(stats.stargazers_count, 6000);
        assert_eq!(stats.license.unwrap().spdx_id.as_deref(), Some("MIT"));
    }

    #[tokio::test]
    async fn test_repo_statistics_error_carries_upstream_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/someone/private"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(json!({"message": "API rate limit exceeded"})),
            )
            .mount(&server)
            .await;

        let client = create_test_client(&server);
        let err = client
            .get_repo_statistics("someone/private")
            .await
            .unwrap_err();

        match err {
            RpluginError::RepoStats { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "API rate limit exceeded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
