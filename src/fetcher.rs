//! HTTP page fetching with bounded retry.
//!
//! [`Transport`] is the seam between the crawler and the network: the real
//! implementation wraps a `reqwest::Client`, tests substitute a scripted one.

use crate::error::{HarvestError, Result};
use crate::retry::RetryPolicy;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// User agent string for requests
const USER_AGENT: &str = concat!("rustdblp/", env!("CARGO_PKG_VERSION"));

/// Raw page content returned by a successful request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

/// One GET request, no retries.
///
/// Implementations return `Err(HarvestError::Http { .. })` for non-success
/// statuses so the caller can retry them like transport failures.
pub trait Transport: Send + Sync {
    fn get<'a>(
        &'a self,
        url: &'a Url,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<FetchedPage>> + Send + 'a>>;
}

/// [`Transport`] backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| HarvestError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get<'a>(
        &'a self,
        url: &'a Url,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<FetchedPage>> + Send + 'a>> {
        Box::pin(async move {
            let response = self
                .client
                .get(url.as_str())
                .header("Accept", "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
                .timeout(timeout)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(HarvestError::Http {
                    status: status.as_u16(),
                });
            }

            let body = response.text().await?;
            Ok(FetchedPage {
                status: status.as_u16(),
                body,
            })
        })
    }
}

/// Fetches pages through a [`Transport`] under a [`RetryPolicy`].
///
/// A 2xx response is never retried, even when the body is empty.
#[derive(Debug, Clone)]
pub struct PageFetcher<T> {
    transport: T,
    policy: RetryPolicy,
    timeout: Duration,
}

impl<T: Transport> PageFetcher<T> {
    pub fn new(transport: T, policy: RetryPolicy, timeout: Duration) -> Self {
        Self {
            transport,
            policy,
            timeout,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// GET `url`, retrying failures per the policy.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::RetriesExhausted`] after `max_retries + 1` failed attempts.
    pub async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
        self.policy
            .run(url.as_str(), |attempt| {
                debug!(url = %url, attempt = attempt, "GET");
                self.transport.get(url, self.timeout)
            })
            .await
    }

    /// GET `base` with the given query parameters appended
    pub async fn fetch_with_params(&self, base: &Url, params: &[(&str, String)]) -> Result<FetchedPage> {
        let url = with_query(base, params);
        self.fetch(&url).await
    }
}

/// Append query parameters to a URL
pub fn with_query(base: &Url, params: &[(&str, String)]) -> Url {
    let mut url = base.clone();
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key, value);
        }
    }
    url
}
