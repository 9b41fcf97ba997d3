//! HTTP item fetcher
//!
//! Fetches each item's `url` one request at a time. Every request is bounded by the timeout the
//! runner passes in, which is the run's merged `BatchConfig::network_timeout_threshold`. Items without a usable url, or whose request fails,
//! are left out of the result. The batch only fails when every attempted request failed at the
//! network level (timeout or connection error), which is what a dead network looks like.

use std::time::Duration;

use url::Url;

use crate::collab::{ItemFetcher, ProgressReporter};
use crate::config::BatchConfig;
use crate::error::{Error, Result};
use crate::types::WorkItem;

/// [`ItemFetcher`] backed by a shared `reqwest::Client`
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher whose client defaults to `config.network_timeout_threshold`.
    ///
    /// The timeout passed to each [`fetch`](ItemFetcher::fetch) takes precedence.
    pub fn new(config: &BatchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.network_timeout_threshold)
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch_one(&self, url: Url, timeout: Duration) -> Result<String> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

fn is_network_failure(err: &Error) -> bool {
    matches!(err, Error::Network(e) if e.is_timeout() || e.is_connect())
}

#[async_trait::async_trait]
impl ItemFetcher for HttpFetcher {
    async fn fetch(
        &self,
        items: &[WorkItem],
        timeout: Duration,
        progress: ProgressReporter,
    ) -> Result<Vec<WorkItem>> {
        let mut fetched = Vec::with_capacity(items.len());
        let mut attempted = 0usize;
        let mut network_failures = 0usize;
        let mut last_error: Option<String> = None;

        for item in items {
            let Some(raw_url) = item.url.as_deref() else {
                tracing::debug!(item_id = %item.id, "Item has no url, skipping");
                continue;
            };
            let url = match Url::parse(raw_url) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!(item_id = %item.id, url = %raw_url, error = %e, "Invalid item url, skipping");
                    continue;
                }
            };

            attempted += 1;
            match self.fetch_one(url, timeout).await {
                Ok(body) => {
                    fetched.push(item.clone().with_content(body));
                    progress.report(fetched.len()).await;
                }
                Err(e) => {
                    if is_network_failure(&e) {
                        network_failures += 1;
                    }
                    tracing::warn!(item_id = %item.id, error = %e, "Failed to fetch item");
                    last_error = Some(e.to_string());
                }
            }
        }

        if attempted > 0 && fetched.is_empty() && network_failures == attempted {
            return Err(Error::Fetch(format!(
                "all {} requests failed: {}",
                attempted,
                last_error.unwrap_or_else(|| "network unreachable".to_string())
            )));
        }

        Ok(fetched)
    }
}
