// Logical Request Domain Model

use serde::{Deserialize, Serialize};

/// Remote node identifier (assigned by the remote store)
pub type NodeId = String;

/// Node specification (opaque JSON payload)
///
/// The queue never looks inside a spec; it only cares about how many specs a
/// request carries and how large they serialize to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec(serde_json::Value);

impl NodeSpec {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// A caller-submitted unit of work
///
/// One logical request may internally require multiple remote calls (an
/// oversized create is split into compliant chunks), but the caller always
/// receives exactly one correlated response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogicalRequest {
    /// Create nodes under an optional parent, in the given order
    CreateNodes {
        parent: Option<NodeId>,
        nodes: Vec<NodeSpec>,
    },
    /// Rename an existing node
    SetName { node: NodeId, name: String },
}

impl LogicalRequest {
    /// Number of new nodes this request would add to the remote store
    pub fn node_count(&self) -> usize {
        match self {
            LogicalRequest::CreateNodes { nodes, .. } => nodes.len(),
            LogicalRequest::SetName { .. } => 0,
        }
    }

    pub fn is_create(&self) -> bool {
        matches!(self, LogicalRequest::CreateNodes { .. })
    }

    /// Serialized size of the request body in bytes
    ///
    /// Used by admission to enforce the remote per-request byte limit. Falls
    /// back to zero only if the payload is not representable as JSON, which
    /// cannot happen for values built from `serde_json::Value`.
    pub fn payload_bytes(&self) -> usize {
        serde_json::to_string(self).map(|s| s.len()).unwrap_or(0)
    }
}
