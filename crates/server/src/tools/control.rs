//! control_message tool implementation.
//!
//! Delivers a control-channel message such as `SKIP_WAITING`.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::{ControlMessage, Controller, MessageOutcome};

use super::json_result;

/// Parameters for the control_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ControlMessageParams {
    /// Message type, e.g. "SKIP_WAITING".
    #[serde(rename = "type")]
    pub kind: String,
}

pub async fn deliver(controller: &Controller, params: ControlMessageParams) -> Result<MessageOutcome, McpError> {
    let message: ControlMessage = params.kind.parse()?;
    Ok(controller.message(message).await?)
}

/// Implementation of the control_message tool.
pub async fn control_impl(controller: &Controller, params: ControlMessageParams) -> Result<CallToolResult, McpError> {
    let outcome = deliver(controller, params).await?;
    Ok(json_result(&outcome)?)
}
