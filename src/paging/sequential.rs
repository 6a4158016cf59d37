//! Sequential traversal of `next`-linked result pages.
//!
//! Search-style queries do not always report a usable `total` up front, so
//! eager parallel pagination is inapplicable. This pager follows the chain
//! one page at a time: items live under `first.as:items.@list` on the
//! initial page and under top-level `items` afterwards; the next page is
//! `first.next` or `next`.

use futures::stream::{self, Stream, TryStreamExt};
use serde_json::Value;
use tracing::debug;

use crate::client::{AnnotationClient, FetchError};

/// Lazy forward-only pager over a `next`-link chain.
///
/// The stream is a single forward pass: restartable from the start by
/// calling [`SequentialPager::items`] again, never mid-stream. It ends
/// when no `next` link remains, when a page answers with a non-200
/// status, or when a page has no items key.
#[derive(Clone)]
pub struct SequentialPager {
    client: AnnotationClient,
}

struct PagerState {
    client: AnnotationClient,
    next: Option<String>,
    initial: bool,
}

impl SequentialPager {
    pub fn new(client: AnnotationClient) -> Self {
        Self { client }
    }

    /// Stream every raw item reachable from `start`.
    ///
    /// Network and JSON failures surface as errors; a non-200 page ends
    /// the stream quietly, matching the service's behaviour of answering
    /// 404 past the end of a result set.
    pub fn items(&self, start: &str) -> impl Stream<Item = Result<Value, FetchError>> {
        let state = PagerState {
            client: self.client.clone(),
            next: Some(start.to_string()),
            initial: true,
        };

        stream::try_unfold(state, |mut state| async move {
            let uri = match state.next.take() {
                Some(uri) => uri,
                None => return Ok(None),
            };

            let page = match state.client.get_json(&uri).await {
                Ok(page) => page,
                Err(FetchError::Status { url, status }) => {
                    debug!("Stopping pagination at {}: HTTP {}", url, status);
                    return Ok(None);
                }
                Err(err) => return Err(err),
            };

            let (items, next) = if state.initial {
                split_first_page(&page)
            } else {
                split_page(&page)
            };
            state.initial = false;

            let items = match items {
                Some(items) => items,
                None => {
                    debug!("Stopping pagination at {}: no items found", uri);
                    return Ok(None);
                }
            };

            state.next = next;
            Ok(Some((items, state)))
        })
        .map_ok(|items| stream::iter(items.into_iter().map(Ok)))
        .try_flatten()
    }
}

/// Items and next link of the initial page (`first.as:items.@list`).
fn split_first_page(page: &Value) -> (Option<Vec<Value>>, Option<String>) {
    let items = page
        .get("first")
        .and_then(|first| first.get("as:items"))
        .and_then(|wrapper| wrapper.get("@list"))
        .and_then(Value::as_array)
        .cloned();

    let next = page
        .get("first")
        .and_then(|first| first.get("next"))
        .or_else(|| page.get("next"))
        .and_then(Value::as_str)
        .map(|next| next.to_string());

    (items, next)
}

/// Items and next link of a subsequent page (top-level `items`).
fn split_page(page: &Value) -> (Option<Vec<Value>>, Option<String>) {
    let items = page.get("items").and_then(Value::as_array).cloned();
    let next = page
        .get("next")
        .and_then(Value::as_str)
        .map(|next| next.to_string());
    (items, next)
}
