//! RPC Request/Response Types

use canopy_core::domain::CreatedNode;
use serde::{Deserialize, Serialize};

/// Request to create nodes under an optional parent
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNodesRequest {
    #[serde(default)]
    pub parent: Option<String>,
    pub nodes: Vec<serde_json::Value>,
}

/// Response from a create operation
#[derive(Debug, Clone, Serialize)]
pub struct CreateNodesResponse {
    pub nodes: Vec<CreatedNode>,
}

/// Request to rename a node
#[derive(Debug, Clone, Deserialize)]
pub struct SetNameRequest {
    pub node: String,
    pub name: String,
}

/// Response from a rename operation
#[derive(Debug, Clone, Serialize)]
pub struct SetNameResponse {
    pub node: String,
    pub name: String,
    pub renamed: bool,
}

/// Request for queue diagnostics (no parameters)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusRequest {}

/// Queue diagnostics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub pending: usize,
    pub dispatching: bool,
    pub quota_used: u64,
    pub quota_ceiling: u64,
    pub last_dispatch_at: Option<i64>,
}

/// Request to re-seed the quota tracker from an out-of-band count
#[derive(Debug, Clone, Deserialize)]
pub struct SeedQuotaRequest {
    pub count: u64,
}

/// Response from a quota seed
#[derive(Debug, Clone, Serialize)]
pub struct SeedQuotaResponse {
    pub count: u64,
}
