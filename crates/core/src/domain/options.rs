// Batching Options - immutable configuration snapshot for the queue lifetime

use std::time::Duration;

/// Operating limits of the remote store, enforced by the delivery queue
///
/// Each limit is enforced independently; no invariant couples them. The
/// defaults mirror the remote API's published constraints.
#[derive(Debug, Clone)]
pub struct BatchingOptions {
    /// Maximum node specifications one remote call may carry
    pub max_nodes_per_request: usize,
    /// Maximum serialized request body size in bytes
    pub max_payload_bytes: usize,
    /// Maximum number of nodes the remote workspace may ever hold
    pub workspace_node_ceiling: u64,
    /// Allowed sustained request rate towards the remote endpoint
    pub requests_per_second: u32,
    /// Maximum re-dispatch attempts after a transient failure
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries
    pub base_backoff: Duration,
}

impl Default for BatchingOptions {
    fn default() -> Self {
        Self {
            max_nodes_per_request: 100,
            max_payload_bytes: 5000,
            workspace_node_ceiling: 750_000,
            requests_per_second: 1,
            max_retries: 3,
            base_backoff: Duration::from_secs(1),
        }
    }
}

impl BatchingOptions {
    /// Minimum spacing between two dispatch attempts
    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.requests_per_second.max(1) as f64)
    }

    /// Effective per-call node limit; a zero setting behaves as one
    pub fn nodes_per_request_limit(&self) -> usize {
        self.max_nodes_per_request.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_interval_derives_from_rate() {
        let opts = BatchingOptions {
            requests_per_second: 4,
            ..Default::default()
        };
        assert_eq!(opts.dispatch_interval(), Duration::from_millis(250));
    }

    #[test]
    fn dispatch_interval_never_divides_by_zero() {
        let opts = BatchingOptions {
            requests_per_second: 0,
            ..Default::default()
        };
        assert_eq!(opts.dispatch_interval(), Duration::from_secs(1));
    }

    #[test]
    fn zero_nodes_per_request_is_treated_as_one() {
        let opts = BatchingOptions {
            max_nodes_per_request: 0,
            ..Default::default()
        };
        assert_eq!(opts.nodes_per_request_limit(), 1);
    }
}
