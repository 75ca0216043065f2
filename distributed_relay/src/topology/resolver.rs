//! Role name → replica addresses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Errors raised while resolving roles against the cluster description.
#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("role `{0}` is not part of the cluster")]
    UnknownRole(String),

    #[error("role `{0}` has no replicas")]
    EmptyRole(String),

    #[error("replica {index} out of range for role `{role}` with {count} replicas")]
    ReplicaOutOfRange {
        role: String,
        index: usize,
        count: usize,
    },

    #[error("invalid cluster description: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read cluster description: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolves roles to replica counts and addresses.
///
/// Implementations must be deterministic and stable for the lifetime of the
/// process: channel layouts are sized from `replica_count` once, at
/// construction.
pub trait TopologyResolver: Send + Sync {
    /// Addressable location of replica `index` of `role`.
    fn resolve_address(&self, role: &str, index: usize) -> Result<String, TopologyError>;

    /// Number of replicas of `role`.
    fn replica_count(&self, role: &str) -> Result<usize, TopologyError>;

    /// Fail unless `index` names an existing replica of `role`.
    fn check_replica(&self, role: &str, index: usize) -> Result<(), TopologyError> {
        let count = self.replica_count(role)?;
        if index >= count {
            return Err(TopologyError::ReplicaOutOfRange {
                role: role.to_string(),
                index,
                count,
            });
        }
        Ok(())
    }
}

/// Fixed cluster description: role name → list of replica addresses.
///
/// Deserializes from the usual cluster map:
///
/// ```json
/// { "worker": ["localhost:6007", "localhost:6008"], "learner": ["localhost:6006"] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Vec<String>>", into = "BTreeMap<String, Vec<String>>")]
pub struct StaticTopology {
    roles: BTreeMap<String, Vec<String>>,
}

impl StaticTopology {
    pub fn new(roles: BTreeMap<String, Vec<String>>) -> Result<Self, TopologyError> {
        if let Some((role, _)) = roles.iter().find(|(_, addrs)| addrs.is_empty()) {
            return Err(TopologyError::EmptyRole(role.clone()));
        }
        Ok(Self { roles })
    }

    /// Add a role with its replica addresses.
    pub fn with_role<I, S>(mut self, role: impl Into<String>, addresses: I) -> Result<Self, TopologyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let role = role.into();
        let addresses: Vec<String> = addresses.into_iter().map(Into::into).collect();
        if addresses.is_empty() {
            return Err(TopologyError::EmptyRole(role));
        }
        self.roles.insert(role, addresses);
        Ok(self)
    }

    /// Add a role with `replicas` placeholder local addresses.
    ///
    /// Convenient for single-host clusters where threads stand in for processes.
    pub fn with_local_role(self, role: impl Into<String>, replicas: usize) -> Result<Self, TopologyError> {
        let role = role.into();
        let addresses: Vec<String> = (0..replicas).map(|i| format!("local:{}/{}", role, i)).collect();
        self.with_role(role, addresses)
    }

    pub fn from_json(text: &str) -> Result<Self, TopologyError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TopologyError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }

    fn addresses(&self, role: &str) -> Result<&[String], TopologyError> {
        self.roles
            .get(role)
            .map(Vec::as_slice)
            .ok_or_else(|| TopologyError::UnknownRole(role.to_string()))
    }
}

impl TopologyResolver for StaticTopology {
    fn resolve_address(&self, role: &str, index: usize) -> Result<String, TopologyError> {
        let addrs = self.addresses(role)?;
        addrs
            .get(index)
            .cloned()
            .ok_or_else(|| TopologyError::ReplicaOutOfRange {
                role: role.to_string(),
                index,
                count: addrs.len(),
            })
    }

    fn replica_count(&self, role: &str) -> Result<usize, TopologyError> {
        Ok(self.addresses(role)?.len())
    }
}

impl TryFrom<BTreeMap<String, Vec<String>>> for StaticTopology {
    type Error = TopologyError;

    fn try_from(roles: BTreeMap<String, Vec<String>>) -> Result<Self, Self::Error> {
        StaticTopology::new(roles)
    }
}

impl From<StaticTopology> for BTreeMap<String, Vec<String>> {
    fn from(topology: StaticTopology) -> Self {
        topology.roles
    }
}
