//! # Distributed Relay: Role-Based Data Fabric for Distributed RL
//!
//! Moves model parameters and experience between the roles of a distributed
//! reinforcement learning cluster (workers, replay buffers, learners) over
//! named, bounded, schema-checked channels.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        Relay Topology                                │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  worker[0]      worker[1]      worker[N]       (source)             │
//! │  ┌────────┐     ┌────────┐     ┌────────┐                           │
//! │  │ policy │     │ policy │     │ policy │                           │
//! │  └───┬────┘     └───┬────┘     └───┬────┘                           │
//! │      │ inbound (p,c) channels      │   one row of the matrix each   │
//! │      └──────────────┼──────────────┘                                │
//! │                     ▼                                               │
//! │           ┌───────────────────┐                                     │
//! │           │  replay_buffer[i] │  (module)                           │
//! │           │  ExperienceStore  │  scatter-merge, random replacement  │
//! │           └─────────┬─────────┘                                     │
//! │                     │ outbound (p,c) channels, [batch, ..] records  │
//! │                     ▼                                               │
//! │           ┌───────────────────┐                                     │
//! │           │     learner[j]    │  (sink)                             │
//! │           │   ParameterSet    │──► parameters back to workers       │
//! │           └───────────────────┘    on a learner → worker edge       │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Layers
//!
//! - [`core`]: tensors, records, schemas and cancellation
//! - [`topology`]: role → replica resolution and channel naming
//! - [`channel`]: bounded FIFO channels and the registry that shares them
//! - [`payload`]: how a holder integrates incoming records
//! - [`buffers`]: the fixed-capacity experience store
//! - [`relay`]: role-gated push/pull over the channel matrices
//! - [`runners`]: driver loops for each role
//!
//! ## Usage
//!
//! ```rust,ignore
//! use distributed_relay::{channel_registry, ParameterSet, RelayConfig, RelayModule, StaticTopology};
//!
//! let topology = StaticTopology::from_file("cluster.json")?;
//! let registry = channel_registry();
//!
//! let config = RelayConfig::new("worker", 0)
//!     .with_source("learner")
//!     .with_sink("worker");
//! let mut params = RelayModule::new(ParameterSet::new(initial), &topology, &registry, config)?;
//!
//! params.pull()?;
//! loop {
//!     // ... act with params.holder() ...
//!     params.maybe_pull()?;
//! }
//! ```

pub mod core;
pub mod topology;
pub mod channel;
pub mod payload;
pub mod buffers;
pub mod relay;
pub mod runners;

// Re-export commonly used types
pub use crate::core::{Buffer, CancelToken, DType, FieldSpec, Record, Schema, SchemaError, Tensor};

// Role resolution and channel naming
pub use topology::{ChannelKey, Edge, EdgeLayout, StaticTopology, TopologyError, TopologyResolver};

// Channels
pub use channel::{
    channel_registry, Channel, ChannelCapacity, ChannelError, ChannelRegistry,
    SharedChannelRegistry, WaitStrategy,
};

// Payload holders
pub use payload::{ParameterSet, PayloadError, PayloadHolder, UpdateStrategy};
pub use buffers::{ExperienceStore, ExperienceStoreConfig};

// Relay modules
pub use relay::{
    DeliveryFailure, PullOptions, PullOutcome, PushReport, RelayConfig, RelayError,
    RelayModule, RelayStats, RoleTopology,
};

// Role drivers
pub use runners::{
    run_consumer, run_producer, DriverStats, Produced, ReplayService, ReplayServiceConfig,
    ReplayStats, ServiceHandle,
};
