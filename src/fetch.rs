//! Bounded-concurrency page fetching.
//!
//! Fetches a known, ordered set of page URIs in parallel while keeping at
//! most `limit` requests in flight, and hands the bodies back in input
//! order regardless of completion order - page numbering determines item
//! ordering in the final envelope, so completion order must never leak.

use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;
use url::Url;

use crate::client::{AnnotationClient, FetchError, W3C_ANNO_PROFILE};
use crate::config::{DEFAULT_CONNECTOR_LIMIT, DEFAULT_TIMEOUT_SECS};

/// Concurrent page fetcher with a hard cap on in-flight connections.
///
/// The failure policy is all-or-nothing: if any page fails (non-2xx,
/// network error, non-JSON body), the whole batch fails and the remaining
/// buffered requests are dropped. A result set with a missing page is
/// unusable downstream.
#[derive(Debug, Clone)]
pub struct ConcurrentFetcher {
    limit: usize,
    timeout: Duration,
    accept: String,
}

impl ConcurrentFetcher {
    /// Create a fetcher with the given concurrency limit and per-request
    /// timeout.
    pub fn new(limit: usize, timeout: Duration) -> Self {
        Self {
            limit: limit.max(1),
            timeout,
            accept: W3C_ANNO_PROFILE.to_string(),
        }
    }

    /// Set the Accept header used for page requests.
    pub fn with_accept(mut self, accept: &str) -> Self {
        self.accept = accept.to_string();
        self
    }

    /// Fetch every URI, at most `limit` at a time, returning JSON bodies
    /// in the same order as the input sequence.
    ///
    /// The connection pool lives only for this call: a fresh client is
    /// built here and torn down when the batch completes, so concurrent
    /// batches never share connections.
    pub async fn fetch_all(&self, uris: Vec<Url>) -> Result<Vec<Value>, FetchError> {
        let client = AnnotationClient::with_accept(self.timeout, &self.accept);

        stream::iter(uris)
            .map(|uri| {
                let client = client.clone();
                async move { client.get_json(uri.as_str()).await }
            })
            .buffered(self.limit)
            .try_collect()
            .await
    }
}

impl Default for ConcurrentFetcher {
    fn default() -> Self {
        Self::new(
            DEFAULT_CONNECTOR_LIMIT,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }
}
