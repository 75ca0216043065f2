//! Bounded FIFO channels and the registry that names them.
//!
//! # Design
//!
//! - One channel per (producer replica, consumer replica) pair per edge
//! - Channels are get-or-create by name, so independent endpoints that compute
//!   the same [`ChannelKey`](crate::topology::ChannelKey) share one FIFO
//! - The schema and capacity of a channel are fixed when it is first opened
//!
//! ```text
//! producer(p) ──enqueue──► [ name: "<m>OutboundTo<s>(p,c)" | FIFO ] ──dequeue──► consumer(c)
//!                            located at the producer side
//! ```

mod queue;
mod registry;
mod wait;


pub use queue::{Channel, ChannelCapacity, ChannelError};
pub use registry::{channel_registry, ChannelRegistry, SharedChannelRegistry};
pub use wait::{dequeue_first, WaitStrategy};
