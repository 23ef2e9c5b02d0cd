// Application Layer - delivery queue and its collaborators

pub mod pacing;
pub mod queue;
pub mod quota;
pub mod retry;
pub mod shutdown;
pub mod splitter;

pub use pacing::PacingGate;
pub use queue::{DeliveryQueue, DeliveryResult, DeliveryTicket, QueueStatus};
pub use quota::QuotaTracker;
pub use retry::{RetryDecision, RetryPolicy};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
