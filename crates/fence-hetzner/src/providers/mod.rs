//! Provider abstractions for power-control APIs.

pub mod hetzner;
#[cfg(test)]
pub(crate) mod mock;
mod traits;

pub use traits::{ApiResponse, Transport, TransportError};
