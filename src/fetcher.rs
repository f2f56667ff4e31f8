use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::types::{PipelineError, Result};

const USER_AGENT: &str = concat!("daybrew/", env!("CARGO_PKG_VERSION"));

/// HTTP layer for feed retrieval. One shared client; the per-request
/// timeout doubles as the per-feed timeout that bounds run latency.
pub struct FeedFetcher {
    client: Client,
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout_secs: u64,
    pub max_redirects: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            max_redirects: 5,
        }
    }
}

impl FeedFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(settings.max_redirects))
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    /// Fetch one feed body. Transport failures and non-2xx responses
    /// both surface as per-feed network errors.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        debug!("Fetching feed: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Network {
                url: url.to_string(),
                message: format!(
                    "HTTP {}: {}",
                    status,
                    status.canonical_reason().unwrap_or("Unknown")
                ),
            });
        }

        response.text().await.map_err(|e| PipelineError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

impl Default for FeedFetcher {
    fn default() -> Self {
        Self::new(FetchSettings::default())
    }
}
