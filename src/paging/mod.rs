//! Paged result discovery.
//!
//! The annotation service answers a container or search GET with an
//! Activity-Streams paged envelope: a `total` count and, when non-empty, a
//! `last` URI carrying a `page` query parameter. `PageCursor` bounds the
//! result set from that envelope and enumerates every page URI.

mod sequential;

pub use sequential::SequentialPager;

use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Errors raised by malformed paging metadata.
///
/// These are fatal for the call: a page count is never guessed.
#[derive(Debug, Error)]
pub enum PagingError {
    #[error("Paged result is missing the `{0}` field")]
    MissingField(&'static str),

    #[error("Last-page URI is not a valid URI: {0}")]
    InvalidUri(#[from] url::ParseError),

    #[error("Last-page URI {0} has no `page` query parameter")]
    MissingPageParam(String),

    #[error("`page` parameter on {uri} is not an integer: {value}")]
    BadPageIndex { uri: String, value: String },
}

/// Bounds a paged result set and enumerates its page URIs.
///
/// Pages are numbered `0..=N` where `N` is the `page` parameter on the
/// `last` URI. A `total` of zero yields no pages at all - callers treat
/// that as "no content", not as an error.
#[derive(Debug, Clone)]
pub struct PageCursor {
    // Last-page URI and its page index; None when the result set is empty.
    bound: Option<(Url, u64)>,
}

impl PageCursor {
    /// Build a cursor from the first-page response of a container or
    /// search query.
    pub fn from_first_page(first: &Value) -> Result<Self, PagingError> {
        let total = first
            .get("total")
            .and_then(Value::as_u64)
            .ok_or(PagingError::MissingField("total"))?;

        if total == 0 {
            return Ok(Self { bound: None });
        }

        let last = first
            .get("last")
            .and_then(Value::as_str)
            .ok_or(PagingError::MissingField("last"))?;
        let last = Url::parse(last)?;

        let value = last
            .query_pairs()
            .find(|(name, _)| name == "page")
            .map(|(_, value)| value.into_owned())
            .ok_or_else(|| PagingError::MissingPageParam(last.to_string()))?;

        let last_index = value.parse().map_err(|_| PagingError::BadPageIndex {
            uri: last.to_string(),
            value,
        })?;

        Ok(Self {
            bound: Some((last, last_index)),
        })
    }

    /// Whether the result set has no pages.
    pub fn is_empty(&self) -> bool {
        self.bound.is_none()
    }

    /// Number of pages in the result set.
    pub fn len(&self) -> usize {
        match &self.bound {
            Some((_, last_index)) => *last_index as usize + 1,
            None => 0,
        }
    }

    /// Ordered page URIs, `page=0` through `page=N`.
    ///
    /// Restartable: each call walks the full sequence again. Every URI is
    /// the `last` URI with only its `page` parameter rewritten.
    pub fn pages(&self) -> impl Iterator<Item = Url> + '_ {
        self.bound.iter().flat_map(|(last, last_index)| {
            (0..=*last_index).map(move |index| set_query_param(last, "page", &index.to_string()))
        })
    }
}

/// Rewrite a query parameter with remove-then-append semantics.
///
/// Any existing pairs with the same name are removed before the new pair
/// is appended, so repeated rewrites never duplicate the parameter. The
/// relative order of the other pairs is preserved.
pub fn set_query_param(url: &Url, name: &str, value: &str) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(existing, _)| existing != name)
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    let mut rewritten = url.clone();
    rewritten.set_query(None);
    {
        let mut pairs = rewritten.query_pairs_mut();
        for (name, value) in &kept {
            pairs.append_pair(name, value);
        }
        pairs.append_pair(name, value);
    }
    rewritten
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn enumerates_every_page() {
        let first = json!({
            "total": 40,
            "last": "https://elucidate.example.org/annotation/w3c/services/search/target?fields=source,id&value=x&page=3"
        });
        let cursor = PageCursor::from_first_page(&first).unwrap();
        assert_eq!(cursor.len(), 4);

        let pages: Vec<Url> = cursor.pages().collect();
        assert_eq!(pages.len(), 4);
        for (index, page) in pages.iter().enumerate() {
            let value = page
                .query_pairs()
                .find(|(name, _)| name == "page")
                .map(|(_, value)| value.into_owned())
                .unwrap();
            assert_eq!(value, index.to_string());
            // only the page parameter differs from `last`
            let other: Vec<_> = page.query_pairs().filter(|(n, _)| n != "page").collect();
            assert_eq!(other.len(), 2);
        }
    }

    #[test]
    fn empty_result_yields_no_pages() {
        let first = json!({ "total": 0 });
        let cursor = PageCursor::from_first_page(&first).unwrap();
        assert!(cursor.is_empty());
        assert_eq!(cursor.pages().count(), 0);
    }

    #[test]
    fn cursor_is_restartable() {
        let first = json!({
            "total": 12,
            "last": "https://example.org/search?page=1"
        });
        let cursor = PageCursor::from_first_page(&first).unwrap();
        let a: Vec<Url> = cursor.pages().collect();
        let b: Vec<Url> = cursor.pages().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_page_param_is_fatal() {
        let first = json!({
            "total": 10,
            "last": "https://example.org/search?fields=source,id"
        });
        let err = PageCursor::from_first_page(&first).unwrap_err();
        assert!(matches!(err, PagingError::MissingPageParam(_)));
    }

    #[test]
    fn missing_total_is_fatal() {
        let err = PageCursor::from_first_page(&json!({})).unwrap_err();
        assert!(matches!(err, PagingError::MissingField("total")));
    }

    #[test]
    fn garbled_page_index_is_fatal() {
        let first = json!({
            "total": 10,
            "last": "https://example.org/search?page=three"
        });
        let err = PageCursor::from_first_page(&first).unwrap_err();
        assert!(matches!(err, PagingError::BadPageIndex { .. }));
    }

    #[test]
    fn rewrite_does_not_duplicate_the_parameter() {
        let url = Url::parse("https://example.org/search?fields=source,id&page=3").unwrap();
        let rewritten = set_query_param(&url, "page", "0");
        let pages: Vec<_> = rewritten
            .query_pairs()
            .filter(|(name, _)| name == "page")
            .map(|(_, value)| value.into_owned())
            .collect();
        assert_eq!(pages, vec!["0"]);
        // the other parameter survives in place
        assert_eq!(
            rewritten.query(),
            Some("fields=source%2Cid&page=0")
        );
    }

    #[test]
    fn rewrite_appends_when_parameter_was_absent() {
        let url = Url::parse("https://example.org/search?fields=source,id").unwrap();
        let rewritten = set_query_param(&url, "page", "2");
        assert!(rewritten.query().unwrap().ends_with("page=2"));
    }
}
