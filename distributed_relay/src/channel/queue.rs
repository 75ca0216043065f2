//! A single named, capacity-bounded FIFO carrying schema-checked records.

use crossbeam_channel::{Receiver, SendTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;

use crate::core::{CancelToken, Record, Schema, SchemaError};

/// Errors raised by channel operations.
///
/// A full or empty channel is not an error: enqueue blocks and dequeue
/// reports "nothing available" instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    #[error("record does not match the channel schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("channel `{name}` is closed")]
    Closed { name: String },

    #[error("blocking channel operation cancelled")]
    Cancelled,

    #[error("channel `{name}` already exists with a different schema")]
    SchemaConflict { name: String },

    #[error("channel `{name}` already exists with capacity {existing:?}, requested {requested:?}")]
    CapacityConflict {
        name: String,
        existing: ChannelCapacity,
        requested: ChannelCapacity,
    },
}

/// Maximum number of queued records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelCapacity {
    Bounded(usize),
    Unbounded,
}

impl ChannelCapacity {
    /// Interpret a configured queue depth; a depth of 0 means unbounded.
    pub fn from_depth(depth: usize) -> Self {
        if depth == 0 {
            ChannelCapacity::Unbounded
        } else {
            ChannelCapacity::Bounded(depth)
        }
    }
}

impl Default for ChannelCapacity {
    fn default() -> Self {
        ChannelCapacity::Bounded(1)
    }
}

/// Bounded FIFO between one producer replica and one consumer replica.
///
/// Both queue ends live here, so the queue itself never disconnects; shutdown is
/// expressed through [`Channel::close`] and cancellation tokens.
pub struct Channel {
    name: String,
    location: String,
    schema: Schema,
    capacity: ChannelCapacity,
    sender: Sender<Record>,
    receiver: Receiver<Record>,
    closed: AtomicBool,
    enqueued: AtomicUsize,
    dequeued: AtomicUsize,
}

impl Channel {
    pub(crate) fn new(
        name: String,
        location: String,
        schema: Schema,
        capacity: ChannelCapacity,
    ) -> Self {
        let (sender, receiver) = match capacity {
            ChannelCapacity::Bounded(n) => crossbeam_channel::bounded(n),
            ChannelCapacity::Unbounded => crossbeam_channel::unbounded(),
        };
        Self {
            name,
            location,
            schema,
            capacity,
            sender,
            receiver,
            closed: AtomicBool::new(false),
            enqueued: AtomicUsize::new(0),
            dequeued: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Address of the producer replica hosting this channel.
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn capacity(&self) -> ChannelCapacity {
        self.capacity
    }

    /// Number of queued records.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.receiver.is_full()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Refuse further enqueues. Queued records can still be dequeued.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            log::debug!("closed channel {}", self.name);
        }
    }

    /// Get debug statistics: (enqueued, dequeued)
    pub fn stats(&self) -> (usize, usize) {
        (
            self.enqueued.load(Ordering::Relaxed),
            self.dequeued.load(Ordering::Relaxed),
        )
    }

    /// Enqueue `record`, blocking while the channel is full.
    ///
    /// The record must match the channel schema exactly. While blocked, the
    /// closed flag and `cancel` are rechecked every `recheck`.
    pub fn enqueue(
        &self,
        record: Record,
        cancel: &CancelToken,
        recheck: Duration,
    ) -> Result<(), ChannelError> {
        self.schema.validate(&record)?;

        let mut pending = record;
        loop {
            if self.is_closed() {
                return Err(ChannelError::Closed {
                    name: self.name.clone(),
                });
            }
            match self.sender.send_timeout(pending, recheck) {
                Ok(()) => {
                    self.enqueued.fetch_add(1, Ordering::Relaxed);
                    return Ok(());
                }
                Err(SendTimeoutError::Timeout(record)) => {
                    if cancel.is_cancelled() {
                        return Err(ChannelError::Cancelled);
                    }
                    log::trace!("channel {} full, waiting", self.name);
                    pending = record;
                }
                Err(SendTimeoutError::Disconnected(_)) => {
                    return Err(ChannelError::Closed {
                        name: self.name.clone(),
                    });
                }
            }
        }
    }

    /// Dequeue the oldest record, if any. Never blocks.
    pub fn try_dequeue(&self) -> Option<Record> {
        let record = self.receiver.try_recv().ok()?;
        self.dequeued.fetch_add(1, Ordering::Relaxed);
        Some(record)
    }

    pub(crate) fn receiver(&self) -> &Receiver<Record> {
        &self.receiver
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("location", &self.location)
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
