//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::{
    CacheFetchParams, ControlMessageParams, DeployVersionParams, control::control_impl, deploy::deploy_impl,
    fetch::fetch_impl, status::status_impl,
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use shellcache_client::Controller;
use shellcache_core::AppConfig;
use url::Url;

/// The main MCP server handler for shellcache.
#[derive(Clone)]
pub struct ShellcacheServer {
    controller: Arc<Controller>,
    config: Arc<AppConfig>,
    origin: Url,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl ShellcacheServer {
    /// Create a new server handler.
    pub fn new(controller: Arc<Controller>, config: Arc<AppConfig>, origin: Url) -> Self {
        Self { controller, config, origin, tool_router: Self::tool_router() }
    }

    /// Route a request through the active version's cache.
    #[tool(
        description = "Route a request through the active cache version. Returns status, response type, matched route, source (cache, network, fallback, pass_through, offline) and body."
    )]
    async fn cache_fetch(&self, params: Parameters<CacheFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.controller, &self.origin, params.0).await
    }

    /// Deliver a control message to the lifecycle controller.
    #[tool(description = "Deliver a control message, e.g. {\"type\": \"SKIP_WAITING\"} to activate the waiting version.")]
    async fn control_message(&self, params: Parameters<ControlMessageParams>) -> Result<CallToolResult, McpError> {
        control_impl(&self.controller, params.0).await
    }

    /// Report deployment slots and partition entry counts.
    #[tool(description = "Report installing, waiting and active versions and the entry count of every partition.")]
    async fn cache_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.controller).await
    }

    /// Register a new version of the running configuration.
    #[tool(description = "Install a new version token. It activates immediately or waits for SKIP_WAITING.")]
    async fn deploy_version(&self, params: Parameters<DeployVersionParams>) -> Result<CallToolResult, McpError> {
        deploy_impl(&self.controller, &self.config, params.0).await
    }
}

impl ServerHandler for ShellcacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "shellcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
