//! Relay module configuration.

use serde::{Deserialize, Serialize};

use super::error::RelayError;
use crate::channel::WaitStrategy;
use crate::core::Schema;

/// The up-to-three roles around one relay module.
///
/// - Inbound edge: `source → module`
/// - Outbound edge: `module → sink`, or `source → sink` when there is no module
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleTopology {
    pub source: Option<String>,
    pub module: Option<String>,
    pub sink: Option<String>,
}

impl RoleTopology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, role: impl Into<String>) -> Self {
        self.source = Some(role.into());
        self
    }

    pub fn with_module(mut self, role: impl Into<String>) -> Self {
        self.module = Some(role.into());
        self
    }

    pub fn with_sink(mut self, role: impl Into<String>) -> Self {
        self.sink = Some(role.into());
        self
    }

    /// `(source, module)` if the inbound edge exists.
    pub fn inbound(&self) -> Option<(&str, &str)> {
        match (&self.source, &self.module) {
            (Some(source), Some(module)) => Some((source.as_str(), module.as_str())),
            _ => None,
        }
    }

    /// `(producer, sink)` if the outbound edge exists; the producer is the
    /// module role, or the source when there is no module.
    pub fn outbound(&self) -> Option<(&str, &str)> {
        let sink = self.sink.as_deref()?;
        let producer = self.module.as_deref().or(self.source.as_deref())?;
        Some((producer, sink))
    }

    /// Whether `role` occupies any of the three positions.
    pub fn contains(&self, role: &str) -> bool {
        [&self.source, &self.module, &self.sink]
            .iter()
            .any(|r| r.as_deref() == Some(role))
    }

    /// At least one edge must exist.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.inbound().is_none() && self.outbound().is_none() {
            return Err(RelayError::MissingRole);
        }
        Ok(())
    }
}

/// Configuration for a relay module.
///
/// Every process on an edge must build its module from the same roles, schema,
/// depths and outbound batch size: channel names, layouts and capacities are
/// derived from them with no handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Roles around the module.
    pub roles: RoleTopology,
    /// Role of this process.
    pub role: String,
    /// Replica index of this process within `role`.
    pub index: usize,
    /// Send every push to all consumer replicas.
    pub push_to_all: bool,
    /// Queue depth of inbound channels (0 = unbounded).
    pub inbound_depth: usize,
    /// Queue depth of outbound channels (0 = unbounded).
    pub outbound_depth: usize,
    /// Outbound records carry this many rows of the record schema.
    pub outbound_batch: Option<usize>,
    /// Record schema; defaults to the holder's own field view.
    pub schema: Option<Schema>,
    /// How blocking pulls wait.
    pub wait: WaitStrategy,
    /// Seed for random consumer selection; `None` draws a random seed.
    pub seed: Option<u64>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            roles: RoleTopology::default(),
            role: String::new(),
            index: 0,
            push_to_all: false,
            inbound_depth: 0,
            outbound_depth: 1,
            outbound_batch: None,
            schema: None,
            wait: WaitStrategy::default(),
            seed: None,
        }
    }
}

impl RelayConfig {
    /// Create a config for replica `index` of `role`.
    pub fn new(role: impl Into<String>, index: usize) -> Self {
        Self {
            role: role.into(),
            index,
            ..Default::default()
        }
    }

    pub fn with_source(mut self, role: impl Into<String>) -> Self {
        self.roles = self.roles.with_source(role);
        self
    }

    pub fn with_module(mut self, role: impl Into<String>) -> Self {
        self.roles = self.roles.with_module(role);
        self
    }

    pub fn with_sink(mut self, role: impl Into<String>) -> Self {
        self.roles = self.roles.with_sink(role);
        self
    }

    pub fn with_push_to_all(mut self, push_to_all: bool) -> Self {
        self.push_to_all = push_to_all;
        self
    }

    pub fn with_inbound_depth(mut self, depth: usize) -> Self {
        self.inbound_depth = depth;
        self
    }

    pub fn with_outbound_depth(mut self, depth: usize) -> Self {
        self.outbound_depth = depth;
        self
    }

    pub fn with_outbound_batch(mut self, rows: usize) -> Self {
        self.outbound_batch = Some(rows);
        self
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_wait(mut self, wait: WaitStrategy) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
