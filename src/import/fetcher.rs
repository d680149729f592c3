//! HTTP fetching for enumerators and transformers
//!
//! Every non-success status is turned into `ImportError::UpstreamStatus`, so
//! callers never parse an error page as content.

use crate::import::source::ImportError;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Configuration for the HTTP fetcher
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string
    pub user_agent: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Value of the `accept` header sent with text requests
    pub accept: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Chrome".to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            accept: "text/html".to_string(),
        }
    }
}

/// Shared HTTP client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, ImportError> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| ImportError::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    async fn get(&self, url: &str, accept: &str) -> Result<reqwest::Response, ImportError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, accept)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImportError::UpstreamStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    /// Fetch a page body as text
    pub async fn get_text(&self, url: &str) -> Result<String, ImportError> {
        let response = self.get(url, &self.config.accept).await?;
        Ok(response.text().await?)
    }

    /// Fetch and decode a JSON document
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ImportError> {
        let response = self.get(url, "application/json").await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| ImportError::Parse(format!("unexpected JSON from {}: {}", url, e)))
    }

    /// Fetch a page, retrying every failure after `backoff` until it succeeds.
    ///
    /// Only returns an error when `cancel` fires.
    pub async fn get_text_retrying(
        &self,
        url: &str,
        backoff: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, ImportError> {
        let mut attempt: u32 = 0;
        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ImportError::Cancelled),
                result = self.get_text(url) => result,
            };

            match result {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempt += 1;
                    warn!(
                        "Fetching {} failed (attempt {}): {}; retrying in {:?}",
                        url, attempt, e, backoff
                    );
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(ImportError::Cancelled),
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }

    /// Stream a response body into `path`, returning the number of bytes written
    pub async fn download_to(&self, url: &str, path: &Path) -> Result<u64, ImportError> {
        let response = self.get(url, "*/*").await?;
        let mut file = tokio::fs::File::create(path).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!("Downloaded {} bytes from {} to {}", written, url, path.display());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetcher_creation() {
        let fetcher = HttpFetcher::new(FetchConfig::default());
        assert!(fetcher.is_ok());
    }

    #[tokio::test]
    async fn test_retrying_fetch_observes_cancellation() {
        let fetcher = HttpFetcher::new(FetchConfig {
            timeout: Duration::from_millis(200),
            connect_timeout: Duration::from_millis(200),
            ..FetchConfig::default()
        })
        .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = fetcher
            .get_text_retrying("http://127.0.0.1:9/", Duration::from_secs(300), &cancel)
            .await;
        assert!(matches!(result, Err(ImportError::Cancelled)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transient() {
        let fetcher = HttpFetcher::new(FetchConfig {
            timeout: Duration::from_millis(500),
            connect_timeout: Duration::from_millis(500),
            ..FetchConfig::default()
        })
        .unwrap();

        let err = fetcher.get_text("http://127.0.0.1:9/").await.unwrap_err();
        assert!(err.is_transient(), "{:?}", err);
    }
}
