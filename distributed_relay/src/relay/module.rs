//! Role-gated push/pull over the channel matrices of one relay module.

use std::sync::Arc;

use super::config::RelayConfig;
use super::error::{DeliveryFailure, Operation, PushReport, RelayError};
use crate::channel::{dequeue_first, Channel, ChannelCapacity, ChannelError, ChannelRegistry};
use crate::core::{CancelToken, Record, Schema};
use crate::payload::PayloadHolder;
use crate::topology::{Edge, EdgeLayout, TopologyError, TopologyResolver};

/// Replica count of `role`; an edge needs at least one replica at each end.
fn replicas(topology: &dyn TopologyResolver, role: &str) -> Result<usize, RelayError> {
    match topology.replica_count(role)? {
        0 => Err(TopologyError::EmptyRole(role.to_string()).into()),
        count => Ok(count),
    }
}

/// Options for [`RelayModule::pull_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullOptions {
    /// Block until a record arrives.
    pub wait: bool,
    /// Hand the record back instead of applying it to the holder.
    pub return_data: bool,
}

impl Default for PullOptions {
    fn default() -> Self {
        Self {
            wait: true,
            return_data: false,
        }
    }
}

/// Result of a pull.
#[derive(Debug, Clone, PartialEq)]
pub enum PullOutcome {
    /// A record was applied to the holder.
    Applied,
    /// A record was dequeued and returned unapplied.
    Data(Record),
    /// Non-blocking pull found every channel empty.
    NoUpdate,
}

/// Counters for one relay module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub pushes: u64,
    pub records_delivered: u64,
    pub delivery_failures: u64,
    pub records_pulled: u64,
    pub empty_polls: u64,
}

/// One row or column of an edge matrix, the only slice a replica may touch.
#[derive(Debug)]
struct EdgeSlice {
    layout: EdgeLayout,
    schema: Schema,
    channels: Vec<Arc<Channel>>,
}

impl EdgeSlice {
    /// Channels `(producer, c)` for every consumer `c`.
    fn row(
        layout: EdgeLayout,
        producer: usize,
        schema: Schema,
        capacity: ChannelCapacity,
        topology: &dyn TopologyResolver,
        registry: &ChannelRegistry,
    ) -> Result<Self, RelayError> {
        let location = topology.resolve_address(layout.producer_role(), producer)?;
        let channels = (0..layout.consumers)
            .map(|c| registry.open(&layout.key(producer, c), &location, &schema, capacity))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            layout,
            schema,
            channels,
        })
    }

    /// Channels `(p, consumer)` for every producer `p`, in ascending order.
    fn column(
        layout: EdgeLayout,
        consumer: usize,
        schema: Schema,
        capacity: ChannelCapacity,
        topology: &dyn TopologyResolver,
        registry: &ChannelRegistry,
    ) -> Result<Self, RelayError> {
        let mut channels = Vec::with_capacity(layout.producers);
        for p in 0..layout.producers {
            let location = topology.resolve_address(layout.producer_role(), p)?;
            channels.push(registry.open(&layout.key(p, consumer), &location, &schema, capacity)?);
        }
        Ok(Self {
            layout,
            schema,
            channels,
        })
    }

    fn names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name().to_string()).collect()
    }
}

/// Wraps a [`PayloadHolder`] and moves its data across the inbound and
/// outbound edges of a role topology.
///
/// What an instance may do depends on its own role:
///
/// | role   | push                                   | pull              |
/// |--------|----------------------------------------|-------------------|
/// | source | inbound row (outbound row if no module)| -                 |
/// | module | outbound row                           | inbound column    |
/// | sink   | -                                      | outbound column   |
pub struct RelayModule<H: PayloadHolder> {
    holder: H,
    config: RelayConfig,
    push_edge: Option<EdgeSlice>,
    pull_edge: Option<EdgeSlice>,
    rng: fastrand::Rng,
    cancel: CancelToken,
    stats: RelayStats,
}

impl<H: PayloadHolder> RelayModule<H> {
    /// Build the module for replica `config.index` of `config.role`.
    ///
    /// Opens (or joins) every channel this replica reads or writes. Fails if
    /// the role is not part of the topology, the index is out of range, or a
    /// channel already exists with a different schema or capacity.
    pub fn new(
        holder: H,
        topology: &dyn TopologyResolver,
        registry: &ChannelRegistry,
        config: RelayConfig,
    ) -> Result<Self, RelayError> {
        let roles = &config.roles;
        roles.validate()?;
        if !roles.contains(&config.role) {
            return Err(RelayError::ForeignRole(config.role.clone()));
        }
        topology.check_replica(&config.role, config.index)?;

        let role = config.role.as_str();
        let row_schema = config.schema.clone().unwrap_or_else(|| holder.schema());
        let outbound_schema = match config.outbound_batch {
            Some(rows) => row_schema.batched(rows),
            None => row_schema.clone(),
        };
        let inbound_capacity = ChannelCapacity::from_depth(config.inbound_depth);
        let outbound_capacity = ChannelCapacity::from_depth(config.outbound_depth);

        let inbound_layout = match roles.inbound() {
            Some((source, module)) => Some(EdgeLayout {
                edge: Edge::Inbound,
                module_role: module.to_string(),
                peer_role: source.to_string(),
                producers: replicas(topology, source)?,
                consumers: replicas(topology, module)?,
            }),
            None => None,
        };
        let outbound_layout = match roles.outbound() {
            Some((producer, sink)) => Some(EdgeLayout {
                edge: Edge::Outbound,
                module_role: producer.to_string(),
                peer_role: sink.to_string(),
                producers: replicas(topology, producer)?,
                consumers: replicas(topology, sink)?,
            }),
            None => None,
        };

        let is_module = roles.module.as_deref() == Some(role);
        let is_source = roles.source.as_deref() == Some(role);
        let is_sink = roles.sink.as_deref() == Some(role);

        let mut push_edge = None;
        let mut pull_edge = None;
        if is_module {
            if let Some(layout) = outbound_layout.clone() {
                push_edge = Some(EdgeSlice::row(
                    layout,
                    config.index,
                    outbound_schema.clone(),
                    outbound_capacity,
                    topology,
                    registry,
                )?);
            }
            if let Some(layout) = inbound_layout.clone() {
                pull_edge = Some(EdgeSlice::column(
                    layout,
                    config.index,
                    row_schema.clone(),
                    inbound_capacity,
                    topology,
                    registry,
                )?);
            }
        } else if is_source {
            push_edge = match (inbound_layout, outbound_layout.clone()) {
                (Some(layout), _) => Some(EdgeSlice::row(
                    layout,
                    config.index,
                    row_schema.clone(),
                    inbound_capacity,
                    topology,
                    registry,
                )?),
                (None, Some(layout)) => Some(EdgeSlice::row(
                    layout,
                    config.index,
                    outbound_schema.clone(),
                    outbound_capacity,
                    topology,
                    registry,
                )?),
                (None, None) => None,
            };
        }
        if is_sink && pull_edge.is_none() {
            if let Some(layout) = outbound_layout {
                pull_edge = Some(EdgeSlice::column(
                    layout,
                    config.index,
                    outbound_schema,
                    outbound_capacity,
                    topology,
                    registry,
                )?);
            }
        }

        log::debug!(
            "relay {}[{}]: push {:?}, pull {:?}",
            role,
            config.index,
            push_edge.as_ref().map(|e| (e.layout.edge, e.channels.len())),
            pull_edge.as_ref().map(|e| (e.layout.edge, e.channels.len())),
        );

        let rng = match config.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };

        Ok(Self {
            holder,
            config,
            push_edge,
            pull_edge,
            rng,
            cancel: CancelToken::new(),
            stats: RelayStats::default(),
        })
    }

    /// Share a cancellation token with other modules or a supervisor.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    // ========================================================================
    // Push
    // ========================================================================

    /// Send `data` (or a snapshot of the holder) to consumer replicas.
    ///
    /// With `force_index` the record goes to that consumer only; with
    /// `push_to_all` it goes to every consumer in ascending order; otherwise
    /// to one consumer chosen uniformly at random. The producer index is
    /// always this replica's own index.
    ///
    /// Blocks while a destination channel is full. A failure on one
    /// destination does not stop the others; if any failed, the full report
    /// comes back inside [`RelayError::PartialDelivery`].
    pub fn push(
        &mut self,
        data: Option<Record>,
        force_index: Option<usize>,
    ) -> Result<PushReport, RelayError> {
        let Some(edge) = self.push_edge.as_ref() else {
            return Err(RelayError::RoleMismatch {
                op: Operation::Push,
                role: self.config.role.clone(),
            });
        };
        if force_index.is_some() && self.config.push_to_all {
            return Err(RelayError::ExclusiveFanOut);
        }

        let consumers = edge.channels.len();
        let targets: Vec<usize> = match force_index {
            Some(index) if index >= consumers => {
                return Err(RelayError::ConsumerOutOfRange {
                    index,
                    count: consumers,
                })
            }
            Some(index) => vec![index],
            None if self.config.push_to_all => (0..consumers).collect(),
            None => vec![self.rng.usize(0..consumers)],
        };

        let record = match data {
            Some(record) => record,
            None => self.holder.snapshot(),
        };
        edge.schema.validate(&record).map_err(ChannelError::from)?;

        let recheck = self.config.wait.period();
        let mut report = PushReport::default();
        for consumer in targets {
            match edge.channels[consumer].enqueue(record.clone(), &self.cancel, recheck) {
                Ok(()) => report.delivered.push(consumer),
                Err(error) => {
                    log::warn!(
                        "relay {}[{}]: push to {} failed: {}",
                        self.config.role,
                        self.config.index,
                        edge.channels[consumer].name(),
                        error
                    );
                    report.failed.push(DeliveryFailure { consumer, error });
                }
            }
        }

        self.stats.pushes += 1;
        self.stats.records_delivered += report.delivered.len() as u64;
        self.stats.delivery_failures += report.failed.len() as u64;

        if report.is_complete() {
            return Ok(report);
        }
        if report.delivered.is_empty() && report.failed.len() == 1 {
            let failure = report.failed.remove(0);
            return Err(match failure.error {
                ChannelError::Cancelled => RelayError::Cancelled,
                error => RelayError::Channel(error),
            });
        }
        Err(RelayError::PartialDelivery(report))
    }

    // ========================================================================
    // Pull
    // ========================================================================

    /// Take the first pending record from this replica's column, if any.
    ///
    /// Producers are scanned in ascending index order and the first non-empty
    /// channel wins, so a low-index producer is favored under contention.
    fn poll_record(&mut self) -> Result<Option<Record>, RelayError> {
        let Some(edge) = self.pull_edge.as_ref() else {
            return Err(RelayError::RoleMismatch {
                op: Operation::Pull,
                role: self.config.role.clone(),
            });
        };
        let Some((producer, record)) = dequeue_first(&edge.channels) else {
            return Ok(None);
        };
        self.stats.records_pulled += 1;
        log::trace!(
            "relay {}[{}]: pulled from producer {}",
            self.config.role,
            self.config.index,
            producer
        );
        Ok(Some(record))
    }

    /// Block until a record arrives or the module is cancelled.
    fn wait_record(&mut self) -> Result<Record, RelayError> {
        loop {
            if let Some(record) = self.poll_record()? {
                return Ok(record);
            }
            if self.cancel.is_cancelled() {
                return Err(RelayError::Cancelled);
            }
            if let Some(edge) = self.pull_edge.as_ref() {
                self.config.wait.wait_once(&edge.channels);
            }
        }
    }

    /// Non-blocking poll that counts an empty result.
    fn try_record(&mut self) -> Result<Option<Record>, RelayError> {
        let record = self.poll_record()?;
        if record.is_none() {
            self.stats.empty_polls += 1;
        }
        Ok(record)
    }

    /// Dequeue one record from this replica's column.
    ///
    /// With `wait` unset an empty column yields [`PullOutcome::NoUpdate`].
    pub fn pull_with(&mut self, options: PullOptions) -> Result<PullOutcome, RelayError> {
        let record = if options.wait {
            self.wait_record()?
        } else {
            match self.try_record()? {
                Some(record) => record,
                None => return Ok(PullOutcome::NoUpdate),
            }
        };
        if options.return_data {
            return Ok(PullOutcome::Data(record));
        }
        self.holder.apply_update(record)?;
        Ok(PullOutcome::Applied)
    }

    /// Block until a record arrives and apply it to the holder.
    pub fn pull(&mut self) -> Result<(), RelayError> {
        let record = self.wait_record()?;
        self.holder.apply_update(record)?;
        Ok(())
    }

    /// Block until a record arrives and return it unapplied.
    pub fn pull_data(&mut self) -> Result<Record, RelayError> {
        self.wait_record()
    }

    /// Apply a pending record if there is one. Never blocks.
    pub fn maybe_pull(&mut self) -> Result<bool, RelayError> {
        match self.try_record()? {
            Some(record) => {
                self.holder.apply_update(record)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Return a pending record if there is one. Never blocks.
    pub fn try_pull_data(&mut self) -> Result<Option<Record>, RelayError> {
        self.try_record()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn holder(&self) -> &H {
        &self.holder
    }

    pub fn holder_mut(&mut self) -> &mut H {
        &mut self.holder
    }

    pub fn into_holder(self) -> H {
        self.holder
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn role(&self) -> &str {
        &self.config.role
    }

    pub fn index(&self) -> usize {
        self.config.index
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    pub fn can_push(&self) -> bool {
        self.push_edge.is_some()
    }

    pub fn can_pull(&self) -> bool {
        self.pull_edge.is_some()
    }

    /// Number of replicas a push can reach.
    pub fn consumer_count(&self) -> usize {
        self.push_edge.as_ref().map_or(0, |e| e.channels.len())
    }

    /// Number of replicas a pull scans.
    pub fn producer_count(&self) -> usize {
        self.pull_edge.as_ref().map_or(0, |e| e.channels.len())
    }

    /// Names of the channels this replica writes, by consumer index.
    pub fn push_channels(&self) -> Vec<String> {
        self.push_edge.as_ref().map(EdgeSlice::names).unwrap_or_default()
    }

    /// Names of the channels this replica reads, by producer index.
    pub fn pull_channels(&self) -> Vec<String> {
        self.pull_edge.as_ref().map(EdgeSlice::names).unwrap_or_default()
    }
}

impl<H: PayloadHolder> std::fmt::Debug for RelayModule<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayModule")
            .field("role", &self.config.role)
            .field("index", &self.config.index)
            .field("push_channels", &self.push_channels())
            .field("pull_channels", &self.pull_channels())
            .field("stats", &self.stats)
            .finish()
    }
}
