//! RPC Error Types
//!
//! Maps delivery errors to JSON-RPC error codes.

use canopy_core::domain::DeliveryError;
use jsonrpsee::types::ErrorObjectOwned;

/// RPC Error Codes
pub mod code {
    pub const ADMISSION_REJECTED: i32 = 4000;
    pub const PERMANENT_FAILURE: i32 = 4001;
    pub const PARTIAL_SPLIT: i32 = 4002;
    pub const RETRIES_EXHAUSTED: i32 = 5000;
    pub const QUEUE_CLOSED: i32 = 5001;
    pub const INTERNAL_ERROR: i32 = 5002;
}

/// Convert DeliveryError to JSON-RPC ErrorObject
///
/// Partial split failures carry the per-index report as structured error
/// data so the caller can decide what to resubmit.
pub fn to_rpc_error(err: DeliveryError) -> ErrorObjectOwned {
    match err {
        DeliveryError::AdmissionRejected(reason) => {
            ErrorObjectOwned::owned(code::ADMISSION_REJECTED, reason.to_string(), None::<()>)
        }
        DeliveryError::Permanent(e) => {
            ErrorObjectOwned::owned(code::PERMANENT_FAILURE, e.to_string(), None::<()>)
        }
        DeliveryError::PartialSplit(report) => ErrorObjectOwned::owned(
            code::PARTIAL_SPLIT,
            report.to_string(),
            Some(report),
        ),
        DeliveryError::RetriesExhausted { .. } => {
            ErrorObjectOwned::owned(code::RETRIES_EXHAUSTED, err.to_string(), None::<()>)
        }
        DeliveryError::QueueClosed => {
            ErrorObjectOwned::owned(code::QUEUE_CLOSED, err.to_string(), None::<()>)
        }
    }
}
