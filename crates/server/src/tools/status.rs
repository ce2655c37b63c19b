//! cache_status tool implementation.
//!
//! Reports deployment slots and per-partition entry counts.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::Serialize;
use shellcache_client::{Controller, ControllerStatus};

use super::json_result;

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct PartitionStatus {
    pub name: String,
    pub entries: usize,
}

/// Output from the cache_status tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CacheStatusOutput {
    pub deployments: ControllerStatus,
    pub partitions: Vec<PartitionStatus>,
}

pub async fn status(controller: &Controller) -> Result<CacheStatusOutput, McpError> {
    let db = controller.db();
    let mut partitions = Vec::new();
    for name in db.partition_names().await? {
        let entries = db.partition(name.as_str())?.count().await?;
        partitions.push(PartitionStatus { name, entries });
    }

    Ok(CacheStatusOutput { deployments: controller.status().await, partitions })
}

/// Implementation of the cache_status tool.
pub async fn status_impl(controller: &Controller) -> Result<CallToolResult, McpError> {
    let output = status(controller).await?;
    Ok(json_result(&output)?)
}
