//! Hetzner Cloud provider.
//!
//! Implements the [`Transport`](crate::providers::Transport) trait for the
//! Hetzner Cloud API and holds the wire models of the server endpoints used
//! for fencing:
//!
//! - `GET /v1/servers/{id}`
//! - `POST /v1/servers/{id}/actions/{poweron|poweroff}`
//! - `GET /v1/servers`

mod client;
mod models;

pub use client::{HetznerCloud, API_BASE_URL, DEFAULT_TIMEOUT_SECS};
pub use models::*;
