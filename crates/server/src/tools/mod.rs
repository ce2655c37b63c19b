//! MCP tool implementations.
//!
//! This module contains all tools exposed by the shellcache server.

pub mod control;
pub mod deploy;
pub mod fetch;
pub mod status;

use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

use crate::error::ToolError;

pub use control::ControlMessageParams;
pub use deploy::DeployVersionParams;
pub use fetch::CacheFetchParams;

/// Wrap a tool output as pretty-printed JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, ToolError> {
    let json = serde_json::to_string_pretty(output)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
