//! Name → channel registry shared by every endpoint of a cluster.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::queue::{Channel, ChannelCapacity, ChannelError};
use crate::core::Schema;
use crate::topology::ChannelKey;

/// Get-or-create registry of channels keyed by their deterministic name.
///
/// The registry is the transport: every replica that participates in an edge
/// holds the same `Arc<ChannelRegistry>`, and opening a key that already exists
/// returns the existing FIFO.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: Mutex<HashMap<String, Arc<Channel>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the channel for `key`, creating it on first use.
    ///
    /// Reopening with a different schema or capacity is a topology
    /// misconfiguration and fails.
    pub fn open(
        &self,
        key: &ChannelKey,
        location: &str,
        schema: &Schema,
        capacity: ChannelCapacity,
    ) -> Result<Arc<Channel>, ChannelError> {
        let name = key.name();
        let mut guard = self.channels.lock();

        if let Some(existing) = guard.get(&name) {
            if existing.schema() != schema {
                return Err(ChannelError::SchemaConflict { name });
            }
            if existing.capacity() != capacity {
                return Err(ChannelError::CapacityConflict {
                    name,
                    existing: existing.capacity(),
                    requested: capacity,
                });
            }
            return Ok(Arc::clone(existing));
        }

        log::debug!("opening channel {} at {} ({:?})", name, location, capacity);
        let channel = Arc::new(Channel::new(
            name.clone(),
            location.to_string(),
            schema.clone(),
            capacity,
        ));
        guard.insert(name, Arc::clone(&channel));
        Ok(channel)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.lock().get(name).cloned()
    }

    /// Close the named channel. Returns false if it does not exist.
    pub fn close(&self, name: &str) -> bool {
        match self.get(name) {
            Some(channel) => {
                channel.close();
                true
            }
            None => false,
        }
    }

    /// Close every registered channel.
    pub fn close_all(&self) {
        for channel in self.channels.lock().values() {
            channel.close();
        }
    }

    /// Sorted channel names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.channels.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.lock().is_empty()
    }
}

/// Thread-safe shared registry.
pub type SharedChannelRegistry = Arc<ChannelRegistry>;

/// Create a new shared channel registry.
pub fn channel_registry() -> SharedChannelRegistry {
    Arc::new(ChannelRegistry::new())
}
