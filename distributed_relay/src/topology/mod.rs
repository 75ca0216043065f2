//! Static cluster topology and deterministic channel addressing.
//!
//! Two independent processes that describe the same logical edge must arrive at
//! the same channel name without a handshake. Everything in this module is
//! therefore a pure function of the static cluster description.

mod edge;
mod resolver;

pub use edge::{ChannelKey, Edge, EdgeLayout};
pub use resolver::{StaticTopology, TopologyError, TopologyResolver};
