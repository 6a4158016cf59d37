//! ETag header handling.

/// Extract the opaque tag from an ETag header value.
///
/// Accepts quoted (`"abc"`), weak (`W/"abc"`), and bare (`abc`) forms.
pub fn parse_etag(raw: &str) -> &str {
    let raw = raw.trim();
    let raw = raw.strip_prefix("W/").unwrap_or(raw);
    raw.trim_matches('"')
}

/// Quoted If-Match value for an ETag as returned by the service.
///
/// If-Match requires a strong comparison, so any weak prefix is dropped
/// and the opaque tag is re-quoted.
pub fn if_match_value(raw: &str) -> String {
    format!("\"{}\"", parse_etag(raw))
}
