// Delivery Error Taxonomy
//
// Every failure the queue can surface to a caller. The queue is a boundary:
// each enqueued future resolves exactly once with a success or one of these,
// and no failure is fatal to the worker loop itself.

use thiserror::Error;

use crate::domain::outcome::SplitReport;
use crate::port::transport::TransportError;

/// Reason an entry was rejected before joining the queue
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionReason {
    #[error("workspace quota exceeded: {current} existing + {requested} requested > ceiling {ceiling}")]
    QuotaExceeded {
        current: u64,
        requested: u64,
        ceiling: u64,
    },

    #[error("payload of {size} bytes exceeds the {limit} byte limit and cannot be split")]
    PayloadTooLarge { size: usize, limit: usize },
}

/// Terminal failure of a logical request
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// Rejected at enqueue, or at dispatch if earlier pending entries
    /// consumed the remaining quota first
    #[error("admission rejected: {0}")]
    AdmissionRejected(AdmissionReason),

    /// Remote explicitly rejected the request as invalid; not retried
    #[error("permanent delivery failure: {0}")]
    Permanent(TransportError),

    /// Retry budget exceeded; wraps the last underlying failure
    #[error("delivery failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: TransportError },

    /// Split create with mixed chunk outcomes; carries the partial result
    #[error("split create partially failed: {0}")]
    PartialSplit(SplitReport),

    /// Queue shut down before the entry resolved
    #[error("delivery queue shut down before the request resolved")]
    QueueClosed,
}

impl DeliveryError {
    pub fn is_admission_rejection(&self) -> bool {
        matches!(self, DeliveryError::AdmissionRejected(_))
    }
}
