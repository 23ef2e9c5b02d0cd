// Port Layer - Interfaces for external dependencies

pub mod time_provider;
pub mod transport;

// Re-exports
pub use time_provider::TimeProvider;
pub use transport::{TransportError, TransportExecutor, TransportReply};
