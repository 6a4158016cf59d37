//! Read-path composition: query, page, fetch, flatten.
//!
//! Ties the page cursor and the concurrent fetcher together into the
//! "give me every raw item for this query" operation the transforms and
//! the deletion walker consume.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::client::{AnnotationClient, FetchError};
use crate::fetch::ConcurrentFetcher;
use crate::normalize::{normalize, NormalizeOptions, Target};
use crate::paging::PageCursor;
use crate::service::{ServiceEndpoints, ServiceError};

/// Errors raised on the read path.
#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Paging(#[from] crate::paging::PagingError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Eagerly-paged reader over the annotation service.
#[derive(Clone)]
pub struct AnnotationReader {
    client: AnnotationClient,
    fetcher: ConcurrentFetcher,
}

impl AnnotationReader {
    pub fn new(client: AnnotationClient, fetcher: ConcurrentFetcher) -> Self {
        Self { client, fetcher }
    }

    /// Fetch every raw item of a paged container or search query.
    ///
    /// GETs the query URI once to bound the result set, fetches all pages
    /// concurrently, and flattens their `items` arrays in page order. An
    /// empty result set returns an empty vec, not an error.
    pub async fn query_items(&self, query: &Url) -> Result<Vec<Value>, RetrieveError> {
        let first = self.client.get_json(query.as_str()).await?;
        let cursor = PageCursor::from_first_page(&first)?;
        if cursor.is_empty() {
            debug!("Empty result set for {}", query);
            return Ok(Vec::new());
        }

        let pages = self.fetcher.fetch_all(cursor.pages().collect()).await?;
        let items = pages
            .iter()
            .flat_map(|page| {
                page.get("items")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default()
            })
            .collect();
        Ok(items)
    }

    /// Distinct manifest URIs for a topic: search by body, take the first
    /// target source of each normalized annotation, and strip fragments.
    pub async fn manifests_by_topic(
        &self,
        endpoints: &ServiceEndpoints,
        topic: &str,
    ) -> Result<Vec<String>, RetrieveError> {
        let query = endpoints.search_by_body(topic)?;
        let items = self.query_items(&query).await?;

        let options = NormalizeOptions::default();
        let mut manifests: Vec<String> = Vec::new();
        for item in &items {
            let Some(anno) = normalize(item, &options) else {
                continue;
            };
            let source = anno.targets.first().and_then(|target| match target {
                Target::Fragment { source, .. } => Some(source.clone()),
                Target::Uri(uri) => Some(uri.clone()),
                Target::Opaque(_) => None,
            });
            if let Some(source) = source {
                let manifest = source
                    .split_once('#')
                    .map(|(base, _)| base.to_string())
                    .unwrap_or(source);
                if !manifests.contains(&manifest) {
                    manifests.push(manifest);
                }
            }
        }
        Ok(manifests)
    }
}
