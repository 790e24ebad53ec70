//! Mock transport for testing.

use crate::error::{HarvestError, Result};
use crate::fetcher::{FetchedPage, Transport};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// A scripted response for [`MockTransport`]
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// 200 with the given body
    Page(String),
    /// Non-success status
    Status(u16),
    /// Never answers
    Hang,
}

type Handler = dyn Fn(&Url) -> MockResponse + Send + Sync;

/// A hand-rolled [`Transport`] that answers from a script and records every request.
///
/// Clones share the script and the request log.
#[derive(Clone)]
pub struct MockTransport {
    handler: Arc<Handler>,
    sequence: Arc<Mutex<Vec<MockResponse>>>,
    requests: Arc<Mutex<Vec<Url>>>,
}

impl MockTransport {
    /// Answer every request with `response`
    pub fn always(response: MockResponse) -> Self {
        Self::from_fn(move |_| response.clone())
    }

    /// Answer requests in order, repeating the last response when exhausted
    pub fn with_sequence(mut responses: Vec<MockResponse>) -> Self {
        assert!(!responses.is_empty(), "sequence must have at least one response");
        responses.reverse();
        let last = responses[0].clone();
        let mut mock = Self::from_fn(move |_| last.clone());
        mock.sequence = Arc::new(Mutex::new(responses));
        mock
    }

    /// Answer each request with a function of its URL
    pub fn from_fn<F>(handler: F) -> Self
    where
        F: Fn(&Url) -> MockResponse + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            sequence: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn requests(&self) -> Vec<Url> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn respond(&self, url: &Url) -> MockResponse {
        if let Ok(mut log) = self.requests.lock() {
            log.push(url.clone());
        }
        let scripted = self.sequence.lock().ok().and_then(|mut s| s.pop());
        scripted.unwrap_or_else(|| (self.handler)(url))
    }
}

impl Transport for MockTransport {
    fn get<'a>(
        &'a self,
        url: &'a Url,
        _timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<FetchedPage>> + Send + 'a>> {
        let response = self.respond(url);
        Box::pin(async move {
            match response {
                MockResponse::Page(body) => Ok(FetchedPage { status: 200, body }),
                MockResponse::Status(status) => Err(HarvestError::Http { status }),
                MockResponse::Hang => std::future::pending().await,
            }
        })
    }
}

/// Query parameter value from a request URL
pub fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}
