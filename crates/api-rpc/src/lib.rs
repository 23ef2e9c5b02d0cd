//! JSON-RPC API Layer
//!
//! Inbound surface through which tool callers submit logical requests to the
//! delivery queue. Each call awaits the queue's resolution, so every caller
//! receives exactly one correlated response.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use server::RpcServer;
