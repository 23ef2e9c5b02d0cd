// Canopy HTTP Infrastructure - TransportExecutor adapter over reqwest

pub mod transport;

pub use transport::{HttpTransport, HttpTransportConfig};
