//! Annotation service endpoint construction.
//!
//! The store groups annotations into containers addressed by the MD5 hash
//! of the target URI, and exposes search services over body and target
//! fields. All URL building for those surfaces lives here.

use md5::{Digest, Md5};
use thiserror::Error;
use url::Url;

/// W3C annotation path prefix on the service.
const W3C_PREFIX: &str = "annotation/w3c/";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Service base URI is not a valid URI: {0}")]
    InvalidBase(#[from] url::ParseError),

    #[error("Service base URI cannot be a base: {0}")]
    CannotBeABase(String),
}

/// URL builder for one annotation service.
#[derive(Debug, Clone)]
pub struct ServiceEndpoints {
    base: Url,
}

impl ServiceEndpoints {
    /// Create endpoints for a service base URI, normalising the trailing
    /// slash so joins behave.
    pub fn new(base: &str) -> Result<Self, ServiceError> {
        let normalized = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{}/", base)
        };
        let base = Url::parse(&normalized)?;
        if base.cannot_be_a_base() {
            return Err(ServiceError::CannotBeABase(base.to_string()));
        }
        Ok(Self { base })
    }

    /// Container URL for an explicit container name, slash-terminated.
    pub fn container(&self, container: &str) -> Result<Url, ServiceError> {
        let path = if container.ends_with('/') {
            format!("{}{}", W3C_PREFIX, container)
        } else {
            format!("{}{}/", W3C_PREFIX, container)
        };
        Ok(self.base.join(&path)?)
    }

    /// Container URL for a target URI, using the MD5 container-naming
    /// convention.
    pub fn container_for_target(&self, target: &str) -> Result<Url, ServiceError> {
        self.container(&container_hash(target))
    }

    /// Search-by-target query URL.
    pub fn search_by_target(&self, target: &str) -> Result<Url, ServiceError> {
        self.search("target", target)
    }

    /// Search-by-body ("topic") query URL.
    pub fn search_by_body(&self, topic: &str) -> Result<Url, ServiceError> {
        self.search("body", topic)
    }

    fn search(&self, field: &str, value: &str) -> Result<Url, ServiceError> {
        let mut url = self
            .base
            .join(&format!("{}services/search/{}", W3C_PREFIX, field))?;
        url.query_pairs_mut()
            .append_pair("fields", "source,id")
            .append_pair("value", value);
        Ok(url)
    }
}

/// MD5 hex digest of a target URI, the store's container-naming scheme.
pub fn container_hash(target: &str) -> String {
    hex::encode(Md5::digest(target.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_urls_are_slash_terminated() {
        let endpoints = ServiceEndpoints::new("https://elucidate.example.org").unwrap();
        let url = endpoints.container("abc123").unwrap();
        assert_eq!(
            url.as_str(),
            "https://elucidate.example.org/annotation/w3c/abc123/"
        );
        let url = endpoints.container("abc123/").unwrap();
        assert_eq!(
            url.as_str(),
            "https://elucidate.example.org/annotation/w3c/abc123/"
        );
    }

    #[test]
    fn container_hash_is_md5_hex() {
        // Md5("abc") is a fixed vector
        assert_eq!(container_hash("abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn search_urls_carry_fields_and_value() {
        let endpoints = ServiceEndpoints::new("https://elucidate.example.org/").unwrap();
        let url = endpoints
            .search_by_target("https://example.org/manifest/1")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://elucidate.example.org/annotation/w3c/services/search/target?fields=source%2Cid&value=https%3A%2F%2Fexample.org%2Fmanifest%2F1"
        );

        let url = endpoints.search_by_body("mary jones").unwrap();
        assert!(url.as_str().contains("search/body"));
        assert!(url.as_str().contains("value=mary+jones"));
    }
}
