//! Experience replay service: an [`ExperienceStore`] relayed between
//! transition producers and minibatch consumers.
//!
//! ```text
//!  producer[0..P] ──► replay[i] ──► consumer[0..C]
//!   single rows       pull: add row      sample_n(batch_size)
//!                     push: minibatch    [batch_size, ..] records
//! ```

use serde::{Deserialize, Serialize};
use std::io;

use super::handle::{spawn_service, ServiceHandle};
use crate::buffers::{ExperienceStore, ExperienceStoreConfig};
use crate::channel::{ChannelRegistry, WaitStrategy};
use crate::core::{CancelToken, Schema};
use crate::payload::PayloadError;
use crate::relay::{RelayConfig, RelayError, RelayModule};
use crate::topology::TopologyResolver;

/// Configuration shared by every endpoint of a replay service.
///
/// Producers, replay replicas and consumers must agree on the roles, the row
/// layout and `batch_size`; derive each endpoint's [`RelayConfig`] from the
/// same value with [`ReplayServiceConfig::endpoint`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayServiceConfig {
    pub producer_role: String,
    pub replay_role: String,
    pub consumer_role: String,
    /// Store dimensions and layout of one transition.
    pub store: ExperienceStoreConfig,
    /// Rows per minibatch served to consumers.
    pub batch_size: usize,
    /// Queue depth of producer → replay channels (0 = unbounded).
    pub inbound_depth: usize,
    /// Queue depth of replay → consumer channels (0 = unbounded).
    pub outbound_depth: usize,
    pub wait: WaitStrategy,
}

impl Default for ReplayServiceConfig {
    fn default() -> Self {
        Self {
            producer_role: "worker".to_string(),
            replay_role: "replay_buffer".to_string(),
            consumer_role: "learner".to_string(),
            store: ExperienceStoreConfig::default(),
            batch_size: 32,
            inbound_depth: 0,
            outbound_depth: 1,
            wait: WaitStrategy::default(),
        }
    }
}

impl ReplayServiceConfig {
    pub fn new(fields: Schema, capacity: usize, batch_size: usize) -> Self {
        Self {
            store: ExperienceStoreConfig::new(capacity, fields),
            batch_size,
            ..Default::default()
        }
    }

    pub fn with_roles(
        mut self,
        producer: impl Into<String>,
        replay: impl Into<String>,
        consumer: impl Into<String>,
    ) -> Self {
        self.producer_role = producer.into();
        self.replay_role = replay.into();
        self.consumer_role = consumer.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.store = self.store.with_seed(seed);
        self
    }

    pub fn with_wait(mut self, wait: WaitStrategy) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_outbound_depth(mut self, depth: usize) -> Self {
        self.outbound_depth = depth;
        self
    }

    /// Relay config for replica `index` of `role` on this service's edges.
    pub fn endpoint(&self, role: impl Into<String>, index: usize) -> RelayConfig {
        RelayConfig::new(role, index)
            .with_source(self.producer_role.clone())
            .with_module(self.replay_role.clone())
            .with_sink(self.consumer_role.clone())
            .with_schema(self.store.fields.clone())
            .with_outbound_batch(self.batch_size)
            .with_inbound_depth(self.inbound_depth)
            .with_outbound_depth(self.outbound_depth)
            .with_wait(self.wait)
    }
}

/// Counters for a replay service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub rows_received: u64,
    pub batches_served: u64,
}

/// One replay replica.
#[derive(Debug)]
pub struct ReplayService {
    relay: RelayModule<ExperienceStore>,
    batch_size: usize,
    stats: ReplayStats,
}

impl ReplayService {
    /// Build replica `index` of the replay role.
    pub fn new(
        config: &ReplayServiceConfig,
        index: usize,
        topology: &dyn TopologyResolver,
        registry: &ChannelRegistry,
    ) -> Result<Self, RelayError> {
        if config.batch_size == 0 {
            return Err(RelayError::Payload(PayloadError::ZeroBatchSize));
        }
        let store = ExperienceStore::from_config(&config.store)?;
        let relay = RelayModule::new(
            store,
            topology,
            registry,
            config.endpoint(config.replay_role.clone(), index),
        )?;
        Ok(Self {
            relay,
            batch_size: config.batch_size,
            stats: ReplayStats::default(),
        })
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.relay = self.relay.with_cancel_token(cancel);
        self
    }

    /// Receive one row, then serve one minibatch.
    pub fn serve_one(&mut self) -> Result<(), RelayError> {
        self.relay.pull()?;
        self.stats.rows_received += 1;

        // Pull just stored a row, so the store cannot be empty here.
        if let Some(batch) = self.relay.holder_mut().sample_n(self.batch_size) {
            self.relay.push(Some(batch), None)?;
            self.stats.batches_served += 1;
            log::trace!("replay[{}]: served batch {}", self.relay.index(), self.stats.batches_served);
        }
        Ok(())
    }

    /// Serve until cancelled.
    pub fn run(&mut self) -> Result<ReplayStats, RelayError> {
        log::info!(
            "replay[{}]: serving batches of {} from {} channels",
            self.relay.index(),
            self.batch_size,
            self.relay.producer_count()
        );
        let stats = loop {
            match self.serve_one() {
                Ok(()) => {}
                Err(RelayError::Cancelled) => break self.stats,
                Err(e) => return Err(e),
            }
        };
        log::info!(
            "replay[{}]: stopped after {} rows, {} batches",
            self.relay.index(),
            stats.rows_received,
            stats.batches_served
        );
        Ok(stats)
    }

    /// Run on a dedicated thread.
    pub fn spawn(self) -> io::Result<ServiceHandle<ReplayStats>> {
        let cancel = self.relay.cancel_token();
        let name = format!("replay-{}", self.relay.index());
        let mut service = self;
        spawn_service(name, cancel, move |_| service.run())
    }

    pub fn store(&self) -> &ExperienceStore {
        self.relay.holder()
    }

    pub fn relay(&self) -> &RelayModule<ExperienceStore> {
        &self.relay
    }

    pub fn stats(&self) -> ReplayStats {
        self.stats
    }
}
