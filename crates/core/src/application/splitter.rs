// Request Splitter - fan an oversized create out into compliant chunks and
// recombine their ordered results into one logical response

use tokio::sync::oneshot;
use tracing::debug;

use crate::application::queue::DeliveryResult;
use crate::domain::{
    CreatedNode, DeliveryError, DeliveryResponse, LogicalRequest, NodeId, NodeOutcome, NodeSpec,
    SplitReport,
};

/// Partition node specifications by simple left-to-right chunking
///
/// No reordering, no rebalancing by content: chunk boundaries fall every
/// `max_per_request` specs. Byte-size violations are not handled here; an
/// individual spec cannot be subdivided, so oversized payloads are rejected
/// at admission instead.
pub fn split(
    parent: Option<NodeId>,
    nodes: Vec<NodeSpec>,
    max_per_request: usize,
) -> Vec<LogicalRequest> {
    let max = max_per_request.max(1);
    let mut chunks = Vec::with_capacity(nodes.len().div_ceil(max));
    let mut nodes = nodes;

    while nodes.len() > max {
        let rest = nodes.split_off(max);
        chunks.push(LogicalRequest::CreateNodes {
            parent: parent.clone(),
            nodes: std::mem::replace(&mut nodes, rest),
        });
    }
    chunks.push(LogicalRequest::CreateNodes {
        parent,
        nodes,
    });

    debug!(chunks = chunks.len(), "Split oversized create");
    chunks
}

/// Terminal outcome of one chunk of a split create
#[derive(Debug)]
pub enum ChunkOutcome {
    /// Confirmed nodes, possibly fewer than the chunk requested
    Created(Vec<CreatedNode>),
    Failed(DeliveryError),
}

/// Collects ordered chunk outcomes and resolves the original caller once
/// every chunk has reported
///
/// Already-created nodes from succeeded chunks are never rolled back; a mixed
/// outcome surfaces as `DeliveryError::PartialSplit` carrying per-index
/// results so the caller can decide what to resubmit.
pub struct SplitAggregate {
    chunk_sizes: Vec<usize>,
    slots: Vec<Option<ChunkOutcome>>,
    remaining: usize,
    sender: Option<oneshot::Sender<DeliveryResult>>,
}

impl SplitAggregate {
    pub fn new(chunk_sizes: Vec<usize>, sender: oneshot::Sender<DeliveryResult>) -> Self {
        let count = chunk_sizes.len();
        Self {
            chunk_sizes,
            slots: (0..count).map(|_| None).collect(),
            remaining: count,
            sender: Some(sender),
        }
    }

    /// Record one chunk's terminal outcome; resolves the caller once the
    /// last outstanding chunk reports
    pub fn record(&mut self, index: usize, outcome: ChunkOutcome) {
        if self.slots[index].is_some() {
            // A chunk never reports twice; guard keeps resolution exactly-once.
            return;
        }
        self.slots[index] = Some(outcome);
        self.remaining -= 1;

        if self.remaining == 0 {
            let result = self.combine();
            if let Some(tx) = self.sender.take() {
                let _ = tx.send(result);
            }
        }
    }

    fn combine(&mut self) -> DeliveryResult {
        let mut results: Vec<NodeOutcome> = Vec::with_capacity(self.chunk_sizes.iter().sum());
        let mut all_created = true;

        for (slot, &size) in self.slots.iter_mut().zip(self.chunk_sizes.iter()) {
            match slot.take() {
                Some(ChunkOutcome::Created(nodes)) => {
                    let confirmed = nodes.len();
                    results.extend(nodes.into_iter().map(NodeOutcome::Created));
                    // Remote partially succeeded inside this chunk: the tail
                    // specs were requested but never confirmed.
                    for _ in confirmed..size {
                        all_created = false;
                        results.push(NodeOutcome::Failed {
                            error: "node not confirmed by remote".to_string(),
                        });
                    }
                }
                Some(ChunkOutcome::Failed(err)) => {
                    all_created = false;
                    let message = err.to_string();
                    for _ in 0..size {
                        results.push(NodeOutcome::Failed {
                            error: message.clone(),
                        });
                    }
                }
                None => unreachable!("combine runs only after every chunk reported"),
            }
        }

        if all_created {
            let nodes = results
                .into_iter()
                .map(|outcome| match outcome {
                    NodeOutcome::Created(node) => node,
                    NodeOutcome::Failed { .. } => unreachable!(),
                })
                .collect();
            Ok(DeliveryResponse::Created { nodes })
        } else {
            let confirmed = results.iter().filter(|r| r.is_created()).count();
            Err(DeliveryError::PartialSplit(SplitReport { results, confirmed }))
        }
    }
}
