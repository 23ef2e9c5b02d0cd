// Delivery Outcomes - what a resolved logical request looks like

use serde::{Deserialize, Serialize};

use crate::domain::request::NodeId;

/// A node the remote store confirmed it created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedNode {
    pub node_id: NodeId,
    pub name: Option<String>,
}

/// Successful resolution of a logical request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliveryResponse {
    /// Created nodes, index-aligned with the request's node specifications
    Created { nodes: Vec<CreatedNode> },
    /// Rename confirmed by the remote store
    Renamed { node: NodeId, name: String },
}

/// Per-original-index outcome inside a split create
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NodeOutcome {
    Created(CreatedNode),
    Failed { error: String },
}

impl NodeOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, NodeOutcome::Created(_))
    }
}

/// Report for a split create where at least one chunk failed terminally
///
/// Already-created nodes are left in place; the remote store offers no
/// transactional delete, so there is nothing to roll back. The caller can
/// inspect `results` to decide what to resubmit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitReport {
    /// One outcome per node specification of the original unsplit request
    pub results: Vec<NodeOutcome>,
    /// Total nodes confirmed created across the succeeded chunks
    pub confirmed: usize,
}

impl SplitReport {
    pub fn failed_count(&self) -> usize {
        self.results.len() - self.confirmed
    }
}

impl std::fmt::Display for SplitReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} of {} nodes confirmed, {} failed",
            self.confirmed,
            self.results.len(),
            self.failed_count()
        )
    }
}
