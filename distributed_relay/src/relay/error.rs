//! Relay errors and per-destination push reports.

use std::fmt;
use thiserror::Error;

use crate::channel::ChannelError;
use crate::payload::PayloadError;
use crate::topology::TopologyError;

/// Relay operation that was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Push,
    Pull,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Push => f.write_str("push"),
            Operation::Pull => f.write_str("pull"),
        }
    }
}

/// One destination that did not receive a push.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryFailure {
    pub consumer: usize,
    pub error: ChannelError,
}

/// Outcome of a push, per destination replica.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushReport {
    /// Consumer indices that received the record, in send order.
    pub delivered: Vec<usize>,
    /// Consumer indices that did not, with the reason.
    pub failed: Vec<DeliveryFailure>,
}

impl PushReport {
    /// True when every attempted destination received the record.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}

impl fmt::Display for PushReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "delivered to {:?}", self.delivered)?;
        for failure in &self.failed {
            write!(f, "; replica {} failed: {}", failure.consumer, failure.error)?;
        }
        Ok(())
    }
}

/// Errors raised by relay modules.
///
/// Configuration errors (role mismatch, exclusive fan-out, missing roles) and
/// schema errors are fatal for the calling process. An empty or full channel
/// is never an error.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("role `{role}` cannot {op} on this module")]
    RoleMismatch { op: Operation, role: String },

    #[error("force_index and push_to_all are mutually exclusive")]
    ExclusiveFanOut,

    #[error("no edge configured: set a sink, or both a source and a module")]
    MissingRole,

    #[error("role `{0}` is not the source, module or sink of this module")]
    ForeignRole(String),

    #[error("consumer index {index} out of range for {count} replicas")]
    ConsumerOutOfRange { index: usize, count: usize },

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("partial delivery: {0}")]
    PartialDelivery(PushReport),

    #[error("blocking relay operation cancelled")]
    Cancelled,
}

impl RelayError {
    /// True for errors that indicate a topology or schema misconfiguration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RelayError::RoleMismatch { .. }
                | RelayError::ExclusiveFanOut
                | RelayError::MissingRole
                | RelayError::ForeignRole(_)
                | RelayError::ConsumerOutOfRange { .. }
                | RelayError::Topology(_)
                | RelayError::Payload(_)
                | RelayError::Channel(ChannelError::Schema(_))
                | RelayError::Channel(ChannelError::SchemaConflict { .. })
                | RelayError::Channel(ChannelError::CapacityConflict { .. })
        )
    }
}
