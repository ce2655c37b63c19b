//! deploy_version tool implementation.
//!
//! Registers a new version token using the running configuration. The new
//! version installs, then activates or waits for `SKIP_WAITING`.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::{Controller, LifecycleState};
use shellcache_core::AppConfig;

use super::json_result;

/// Parameters for the deploy_version tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeployVersionParams {
    /// New version token, e.g. "v2".
    pub version: String,

    /// Activate as soon as installed (default: the configured behavior).
    #[serde(default)]
    pub skip_waiting: Option<bool>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DeployVersionOutput {
    pub version: String,
    pub state: LifecycleState,
    pub precached: usize,
}

pub async fn deploy(
    controller: &Controller, base: &AppConfig, params: DeployVersionParams,
) -> Result<DeployVersionOutput, McpError> {
    let config = AppConfig {
        version: params.version,
        skip_waiting_on_install: params.skip_waiting.unwrap_or(base.skip_waiting_on_install),
        ..base.clone()
    };

    let deployment = controller.register(&config).await?;
    Ok(DeployVersionOutput {
        version: deployment.version().to_string(),
        state: deployment.state(),
        precached: deployment.precache_urls().len(),
    })
}

/// Implementation of the deploy_version tool.
pub async fn deploy_impl(
    controller: &Controller, base: &AppConfig, params: DeployVersionParams,
) -> Result<CallToolResult, McpError> {
    let output = deploy(controller, base, params).await?;
    Ok(json_result(&output)?)
}
