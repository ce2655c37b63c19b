//! Cache key derivation.

use sha2::{Digest, Sha256};

use crate::http::Request;

/// Compute the stored key hash for a method and URL.
pub fn compute_cache_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Identity of a request inside a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    /// Hash of method and full URL; primary key within a partition.
    pub hash: String,
    pub method: String,
    pub url: String,
    /// URL without its query string, used by loose lookups.
    pub loose_url: String,
}

impl CacheKey {
    pub fn for_request(request: &Request) -> Self {
        let url = request.url.to_string();
        Self {
            hash: compute_cache_key(&request.method, &url),
            method: request.method.clone(),
            url,
            loose_url: request.url_without_search().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn test_hash_stability() {
        let hash1 = compute_cache_key("GET", "https://app.test/");
        let hash2 = compute_cache_key("GET", "https://app.test/");
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_hash_different_method() {
        assert_ne!(compute_cache_key("GET", "https://app.test/"), compute_cache_key("HEAD", "https://app.test/"));
    }

    #[test]
    fn test_hash_format() {
        let hash = compute_cache_key("GET", "https://app.test/");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_query_participates_in_exact_key_only() {
        let a = CacheKey::for_request(&Request::get(Url::parse("https://app.test/app.js?v=1").unwrap()));
        let b = CacheKey::for_request(&Request::get(Url::parse("https://app.test/app.js?v=2").unwrap()));
        assert_ne!(a.hash, b.hash);
        assert_eq!(a.loose_url, b.loose_url);
        assert_eq!(a.loose_url, "https://app.test/app.js");
    }
}
