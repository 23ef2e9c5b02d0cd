// Transport Executor Port
// Abstraction over the remote store's single HTTP endpoint. The queue treats
// it as an opaque, possibly-slow, possibly-failing function that must return
// a classified outcome and never panic.

use crate::domain::outcome::CreatedNode;
use crate::domain::request::LogicalRequest;
use async_trait::async_trait;
use thiserror::Error;

/// Structured success payload from one remote call
#[derive(Debug, Clone)]
pub enum TransportReply {
    /// Nodes the remote confirmed, in request order
    ///
    /// May be shorter than the request if the remote side only partially
    /// succeeded; the queue trusts this count, not the requested count.
    Created { nodes: Vec<CreatedNode> },
    /// Rename acknowledged
    Renamed,
}

/// Classified transport failure
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("remote server error (status {status}): {message}")]
    Server { status: u16, message: String },

    #[error("remote timed out after {0}ms")]
    Timeout(u64),

    /// Remote explicitly rejected the payload as malformed
    #[error("remote rejected request: {0}")]
    Rejected(String),
}

impl TransportError {
    /// Anything that is not a clear client-side rejection is worth retrying
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::Rejected(_))
    }
}

/// Transport Executor trait
///
/// Implementations:
/// - HttpTransport (infra-http): real remote endpoint over reqwest
/// - MockTransport (below): scripted outcomes for tests
#[async_trait]
pub trait TransportExecutor: Send + Sync {
    /// Deliver one already-size/limit-compliant request to the remote store
    ///
    /// # Errors
    /// - `TransportError::Network` / `Server` / `Timeout` - retryable
    /// - `TransportError::Rejected` - permanent, must not be retried
    async fn execute(&self, request: &LogicalRequest) -> Result<TransportReply, TransportError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    /// Mock transport behavior for one dispatch
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Confirm every requested node
        Succeed,
        /// Confirm only the first N nodes of a create
        SucceedPartial(usize),
        /// Fail with a retryable network error
        FailTransient(String),
        /// Fail with a permanent rejection
        FailPermanent(String),
    }

    /// One observed dispatch (for pacing and split assertions)
    #[derive(Debug, Clone)]
    pub struct DispatchRecord {
        pub node_count: usize,
        pub at: tokio::time::Instant,
    }

    /// Mock Transport Executor for testing
    ///
    /// Consumes a script of behaviors front-to-back, then falls back to the
    /// default behavior. Records every dispatch with its timestamp.
    pub struct MockTransport {
        default_behavior: MockBehavior,
        script: Mutex<VecDeque<MockBehavior>>,
        calls: Mutex<Vec<DispatchRecord>>,
        next_node: AtomicU64,
    }

    impl MockTransport {
        pub fn new(default_behavior: MockBehavior) -> Self {
            Self {
                default_behavior,
                script: Mutex::new(VecDeque::new()),
                calls: Mutex::new(Vec::new()),
                next_node: AtomicU64::new(1),
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockBehavior::Succeed)
        }

        pub fn new_transient_failure(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::FailTransient(message.into()))
        }

        /// Scripted behaviors consumed one per dispatch, then the default
        pub fn with_script(mut self, script: Vec<MockBehavior>) -> Self {
            self.script = Mutex::new(script.into());
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn records(&self) -> Vec<DispatchRecord> {
            self.calls.lock().unwrap().clone()
        }

        fn confirm_nodes(&self, count: usize) -> Vec<CreatedNode> {
            (0..count)
                .map(|_| {
                    let n = self.next_node.fetch_add(1, Ordering::SeqCst);
                    CreatedNode {
                        node_id: format!("node-{}", n),
                        name: None,
                    }
                })
                .collect()
        }
    }

    #[async_trait]
    impl TransportExecutor for MockTransport {
        async fn execute(
            &self,
            request: &LogicalRequest,
        ) -> Result<TransportReply, TransportError> {
            self.calls.lock().unwrap().push(DispatchRecord {
                node_count: request.node_count(),
                at: tokio::time::Instant::now(),
            });

            let behavior = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.default_behavior.clone());

            match behavior {
                MockBehavior::Succeed => match request {
                    LogicalRequest::CreateNodes { nodes, .. } => Ok(TransportReply::Created {
                        nodes: self.confirm_nodes(nodes.len()),
                    }),
                    LogicalRequest::SetName { .. } => Ok(TransportReply::Renamed),
                },
                MockBehavior::SucceedPartial(confirmed) => match request {
                    LogicalRequest::CreateNodes { nodes, .. } => Ok(TransportReply::Created {
                        nodes: self.confirm_nodes(confirmed.min(nodes.len())),
                    }),
                    LogicalRequest::SetName { .. } => Ok(TransportReply::Renamed),
                },
                MockBehavior::FailTransient(msg) => Err(TransportError::Network(msg)),
                MockBehavior::FailPermanent(msg) => Err(TransportError::Rejected(msg)),
            }
        }
    }
}
