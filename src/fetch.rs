use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::CrawlError;
use crate::utils::get_random_user_agent;

/// The HTTP collaborator: `fetch(url) -> content`.
///
/// The engine only ever sees this trait, so tests drive it with an in-memory
/// fetcher and the binary plugs in [`HttpFetcher`].
pub trait PageFetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<String, CrawlError>>;
}

/// Production fetcher backed by a shared `reqwest` client.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, CrawlError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .cookie_store(true)
            .build()?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<String, CrawlError>> {
        async move {
            let response = self
                .client
                .get(url)
                .header("User-Agent", get_random_user_agent())
                .header(
                    "Accept",
                    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
                )
                .header("Accept-Language", "en-US,en;q=0.5")
                .send()
                .await
                .map_err(|e| CrawlError::Fetch {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(CrawlError::Fetch {
                    url: url.to_string(),
                    reason: format!("HTTP error: {status}"),
                });
            }

            response.text().await.map_err(|e| CrawlError::Fetch {
                url: url.to_string(),
                reason: format!("failed to read response body: {e}"),
            })
        }
        .boxed()
    }
}
