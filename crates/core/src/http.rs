//! Request and response model shared by the store, the classifier and the
//! strategies.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

/// How the client issued the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestMode {
    /// Top-level document navigation.
    Navigate,
    /// Any subresource load (script, image, fetch call...).
    #[default]
    Other,
}

/// An inbound request as seen by the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Upper-cased HTTP method.
    pub method: String,
    pub url: Url,
    /// Value of the Accept header, if any.
    pub accept: Option<String>,
    pub mode: RequestMode,
}

impl Request {
    pub fn new(method: &str, mut url: Url) -> Self {
        url.set_fragment(None);
        Self { method: method.to_ascii_uppercase(), url, accept: None, mode: RequestMode::Other }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// A GET navigation request, as issued when a page is opened.
    pub fn navigate(url: Url) -> Self {
        Self::get(url).with_mode(RequestMode::Navigate)
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// The request URL with its query string removed.
    pub fn url_without_search(&self) -> Url {
        let mut url = self.url.clone();
        url.set_query(None);
        url
    }
}

/// Response classification, mirroring what a browser exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// Same-origin response with an inspectable status.
    Basic,
    /// Cross-origin response; status is not trusted but the body is storable.
    Opaque,
    /// Synthetic network-error response.
    Error,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Opaque => "opaque",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "basic" => Some(Self::Basic),
            "opaque" => Some(Self::Opaque),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// A response returned by the network or read back from a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// URL the response was produced for (after redirects).
    pub url: Url,
    pub status: u16,
    pub kind: ResponseType,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(url: Url, status: u16, kind: ResponseType, body: impl Into<Bytes>) -> Self {
        Self { url, status, kind, headers: Vec::new(), body: body.into() }
    }

    /// Network-error response returned when neither network nor cache can answer.
    pub fn error(url: Url) -> Self {
        Self::new(url, 0, ResponseType::Error, Bytes::new())
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Status in the 2xx range on a non-error response.
    pub fn is_ok(&self) -> bool {
        self.kind != ResponseType::Error && (200..300).contains(&self.status)
    }

    /// Whether a strategy may persist this response.
    pub fn is_cacheable(&self) -> bool {
        self.is_ok() || self.kind == ResponseType::Opaque
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}
