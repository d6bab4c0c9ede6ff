//! Fetching of directory listing pages
//!
//! The crawler talks to the remote server only through [`ListingFetcher`],
//! so tests can drive it with an in-memory tree.

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};

/// Browser User-Agent sent with every request; some servers refuse script agents
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; ) AppleWebKit/537.36 \
                                      (KHTML, like Gecko) Chrome/83.0.4086.0 Safari/537.36";

/// Per-request timeout used when none is configured
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Source of directory listing pages
#[async_trait]
pub trait ListingFetcher: Send + Sync {
    /// Fetch the HTML body of the listing page at `url`
    ///
    /// Any failure (transport, timeout, non-2xx status) is an `Error::Fetch`.
    async fn fetch(&self, url: &Url) -> Result<String>;
}

/// HTTP fetcher backed by a shared `reqwest` client
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a client with the given User-Agent and per-request timeout
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ListingFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<String> {
        let fetch_error = |reason: String| Error::Fetch { url: url.to_string(), reason };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| fetch_error(describe(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {}", status)));
        }

        response.text().await.map_err(|e| fetch_error(describe(&e)))
    }
}

fn describe(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_with_defaults() {
        let fetcher = HttpFetcher::new(DEFAULT_USER_AGENT, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(fetcher.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_fetch_error() {
        // Grab a free port, then release it so nothing is listening there
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let fetcher = HttpFetcher::new(DEFAULT_USER_AGENT, Duration::from_secs(2)).unwrap();
        let url = Url::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();

        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(matches!(err, Error::Fetch { .. }));
    }
}
