//! HTTP client for the annotation service.
//!
//! Thin wrapper around reqwest with Accept-profile headers, typed fetch
//! errors, and the conditional-request support the deletion walker needs
//! (fresh ETag via GET, DELETE preconditioned with If-Match).

mod response;

pub use response::{if_match_value, parse_etag};

use std::time::Duration;

use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Accept header for the W3C Web Annotation profile.
pub const W3C_ANNO_PROFILE: &str =
    "application/ld+json; profile=\"http://www.w3.org/ns/anno.jsonld\"";

/// Accept header for the IIIF Presentation 2 profile.
pub const IIIF_PRESENTATION_PROFILE: &str =
    "application/ld+json; profile=\"http://iiif.io/api/presentation/2/context.json\"";

/// Errors that can occur while talking to the annotation service.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },

    #[error("{url} returned a non-JSON body: {source}")]
    Json {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// The HTTP status carried by this error, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// HTTP client for annotation service requests.
#[derive(Clone)]
pub struct AnnotationClient {
    client: Client,
    accept: String,
}

impl AnnotationClient {
    /// Create a client using the W3C annotation Accept profile.
    pub fn new(timeout: Duration) -> Self {
        Self::with_accept(timeout, W3C_ANNO_PROFILE)
    }

    /// Create a client with a custom Accept header.
    pub fn with_accept(timeout: Duration, accept: &str) -> Self {
        let client = Client::builder()
            .user_agent(concat!("annolist/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            accept: accept.to_string(),
        }
    }

    /// GET a URL and parse the body as JSON.
    ///
    /// Any non-2xx status is a `FetchError::Status`; this is the
    /// all-or-nothing building block the page fetcher relies on.
    pub async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        self.get_json_as(url, &self.accept).await
    }

    /// GET with an explicit Accept header, for resources outside the
    /// annotation profile (IIIF manifests).
    pub async fn get_json_as(&self, url: &str, accept: &str) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, accept)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        response.json().await.map_err(|source| FetchError::Json {
            url: url.to_string(),
            source,
        })
    }

    /// GET a URL, returning the JSON body together with the response ETag.
    ///
    /// Used immediately before a DELETE to satisfy If-Match concurrency
    /// control with a fresh precondition.
    pub async fn get_with_etag(&self, url: &str) -> Result<(Value, Option<String>), FetchError> {
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, &self.accept)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let etag = response
            .headers()
            .get(header::ETAG)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = response.json().await.map_err(|source| FetchError::Json {
            url: url.to_string(),
            source,
        })?;

        Ok((body, etag))
    }

    /// DELETE a URL, preconditioned on the given ETag.
    ///
    /// Returns the raw status code: the deletion walker records non-204
    /// statuses instead of treating them as errors.
    pub async fn delete(&self, url: &str, etag: Option<&str>) -> Result<StatusCode, FetchError> {
        let mut request = self.client.delete(url);
        if let Some(etag) = etag {
            request = request.header(header::IF_MATCH, if_match_value(etag));
        }

        let response = request.send().await.map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;

        debug!("DELETE {} -> {}", url, response.status());
        Ok(response.status())
    }
}
