//! cache_fetch tool implementation.
//!
//! Routes one request through the active version and reports how it was
//! answered.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::fetch::canonicalize;
use shellcache_client::{Controller, Source};
use shellcache_core::http::RequestMode;
use shellcache_core::{Error, Request};
use url::Url;

use super::json_result;
use crate::error::ToolError;

/// Input parameters for the cache_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheFetchParams {
    /// URL to request; relative URLs resolve against the origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Optional Accept header.
    #[serde(default)]
    pub accept: Option<String>,

    /// "navigate" for top-level documents, "other" (default) otherwise.
    #[serde(default)]
    pub mode: RequestMode,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for the cache_fetch tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CacheFetchOutput {
    pub url: String,
    /// HTTP status; 0 for offline or opaque responses.
    pub status: u16,
    /// "basic", "opaque" or "error".
    pub response_type: String,
    /// Matched route class, if any.
    pub route: Option<String>,
    pub source: Source,
    pub content_type: Option<String>,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
    pub body_bytes: usize,
}

pub async fn fetch(
    controller: &Controller, origin: &Url, params: CacheFetchParams,
) -> Result<CacheFetchOutput, McpError> {
    let url = canonicalize(&params.url, origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let method = params.method.trim();
    if method.is_empty() || !method.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(ToolError::InvalidInput(format!("invalid method {:?}", params.method)).into());
    }

    let mut request = Request::new(method, url).with_mode(params.mode);
    if let Some(accept) = params.accept {
        request = request.with_accept(accept);
    }

    let handled = controller.handle(&request).await;
    tracing::debug!(url = %request.url, route = ?handled.route, source = handled.source.as_str(), "routed");

    let response = handled.response;
    Ok(CacheFetchOutput {
        url: response.url.to_string(),
        status: response.status,
        response_type: response.kind.as_str().to_string(),
        route: handled.route,
        source: handled.source,
        content_type: response.content_type().map(str::to_string),
        body: String::from_utf8_lossy(&response.body).into_owned(),
        body_bytes: response.body.len(),
    })
}

/// Implementation of the cache_fetch tool.
pub async fn fetch_impl(
    controller: &Controller, origin: &Url, params: CacheFetchParams,
) -> Result<CallToolResult, McpError> {
    let output = fetch(controller, origin, params).await?;
    Ok(json_result(&output)?)
}
