//! Relay modules: a payload holder plus the channels around it.
//!
//! - [`RelayConfig`] / [`RoleTopology`]: who sends to whom
//! - [`RelayModule`]: role-gated push and pull
//! - [`PushReport`]: per-destination delivery outcome

mod config;
mod error;
mod module;

pub use config::{RelayConfig, RoleTopology};
pub use error::{DeliveryFailure, Operation, PushReport, RelayError};
pub use module::{PullOptions, PullOutcome, RelayModule, RelayStats};
