//! Power fencing agent for virtual machines on Hetzner Cloud.
//!
//! A cluster manager uses the agent to find out, or force, the power state
//! of a node so that a node presumed dead or partitioned can be evicted
//! safely.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │      fence_hetzner (options, exit codes)     │
//! └──────────────────────┬───────────────────────┘
//!                        │
//! ┌──────────────────────▼───────────────────────┐
//! │  dispatch: status / on / off / reboot / list │
//! └──────────────────────┬───────────────────────┘
//!                        │
//! ┌──────────────────────▼───────────────────────┐
//! │  FenceAgent                                  │
//! │  • get_power_status   (429 → unknown)        │
//! │  • set_power_status   (429/423 → retry)      │
//! │  • list_targets       (errors → empty)       │
//! └─────────┬──────────────────────────┬─────────┘
//!           │                          │
//! ┌─────────▼─────────┐      ┌─────────▼─────────┐
//! │ Transport         │      │ state::map_state  │
//! │ (HetznerCloud)    │      │ (static table)    │
//! └───────────────────┘      └───────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use fence_hetzner::providers::hetzner::HetznerCloud;
//! use fence_hetzner::{FenceAgent, PowerAction, PowerState};
//!
//! let agent = FenceAgent::new(HetznerCloud::new(&api_token)?);
//!
//! if agent.get_power_status("42").await? != PowerState::Off {
//!     agent.set_power_status("42", PowerAction::Off).await?;
//! }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod metadata;
pub mod providers;
pub mod state;

pub use agent::{FenceAgent, PowerAction, RetryPolicy, TargetList};
pub use config::{Action, FenceArgs, FenceOptions};
pub use dispatch::{fence_action, Outcome};
pub use error::{FenceError, EC_GENERIC_ERROR};
pub use state::{map_state, PowerState, Target};
