//! Network collaborator used by the strategies.
//!
//! ### Response typing
//! - Same-origin responses are `basic` and expose their status.
//! - Cross-origin 2xx responses are `opaque`; strategies treat them as cacheable.
//! - A cross-origin error status is visible here, so it stays `basic` and is
//!   never cached.
//! - Non-2xx statuses are returned as responses, never as errors.
//!
//! ### Cache defeat
//! - Precache fetches send `Cache-Control: no-cache` and `Pragma: no-cache`
//!   so intermediate caches revalidate with the origin.

pub mod error;
pub mod url;

use async_trait::async_trait;
use reqwest::{Client, Method, header};
use std::time::{Duration, Instant};

pub use self::error::FetchError;
pub use self::url::{UrlError, canonicalize, same_origin};

use ::url::Url;
use shellcache_core::{Request, Response, ResponseType};

/// Per-call options for a network fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Deadline for the whole fetch; `None` uses the client ceiling.
    pub timeout: Option<Duration>,
    /// Ask intermediate caches to revalidate with the origin.
    pub cache_defeat: bool,
}

impl FetchOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout: Some(timeout), cache_defeat: false }
    }

    pub fn cache_defeating() -> Self {
        Self { timeout: None, cache_defeat: true }
    }
}

/// Abstract network collaborator.
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform a request. Resolves with any HTTP status; fails only when no
    /// response was obtained.
    async fn fetch(&self, request: &Request, options: &FetchOptions) -> Result<Response, FetchError>;
}

/// Configuration for the HTTP network client.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// User agent string (default: "shellcache/0.1")
    pub user_agent: String,

    /// Ceiling for every request (default: 20s)
    pub timeout: Duration,

    /// Serving origin, used to type responses basic or opaque.
    pub origin: Url,
}

impl NetworkConfig {
    pub fn new(origin: Url) -> Self {
        Self { user_agent: "shellcache/0.1".to_string(), timeout: Duration::from_millis(20_000), origin }
    }
}

/// reqwest-backed network collaborator.
pub struct HttpNetwork {
    http: Client,
    config: NetworkConfig,
}

impl HttpNetwork {
    /// Create a new network client with the given configuration.
    pub fn new(config: NetworkConfig) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| FetchError::InvalidRequest(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    fn response_type(&self, url: &Url, status: u16) -> ResponseType {
        if same_origin(url, &self.config.origin) || !(200..300).contains(&status) {
            ResponseType::Basic
        } else {
            ResponseType::Opaque
        }
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request, options: &FetchOptions) -> Result<Response, FetchError> {
        let start = Instant::now();
        let method =
            Method::from_bytes(request.method.as_bytes()).map_err(|e| FetchError::InvalidRequest(e.to_string()))?;

        let mut builder = self.http.request(method, request.url.as_str());
        if let Some(accept) = &request.accept {
            builder = builder.header(header::ACCEPT, accept);
        }
        if options.cache_defeat {
            builder = builder
                .header(header::CACHE_CONTROL, "no-cache")
                .header(header::PRAGMA, "no-cache");
        }
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| match FetchError::from(e) {
            FetchError::Timeout { .. } => FetchError::Timeout {
                after_ms: options.timeout.unwrap_or(self.config.timeout).as_millis() as u64,
            },
            other => other,
        })?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Body(std::sync::Arc::new(e)))?;

        tracing::debug!(
            url = %request.url,
            final_url = %final_url,
            status,
            bytes = bytes.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "network fetch completed"
        );

        let kind = self.response_type(&final_url, status);
        Ok(Response { url: final_url, status, kind, headers, body: bytes })
    }
}
