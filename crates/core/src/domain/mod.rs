// Domain Layer - requests, outcomes, options, errors

pub mod error;
pub mod options;
pub mod outcome;
pub mod request;

pub use error::{AdmissionReason, DeliveryError};
pub use options::BatchingOptions;
pub use outcome::{CreatedNode, DeliveryResponse, NodeOutcome, SplitReport};
pub use request::{LogicalRequest, NodeId, NodeSpec};
