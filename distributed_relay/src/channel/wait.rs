//! Waiting for any of several channels to become non-empty.

use crossbeam_channel::Select;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::queue::Channel;
use crate::core::Record;

/// How a blocking pull waits for data.
///
/// `Poll` sleeps a fixed interval between scans. `Notify` parks on the
/// receivers and wakes as soon as any of them is enqueued to, rechecking
/// cancellation every `recheck_ms`. Both keep the same scan-order contract:
/// after a wake, producers are scanned in ascending index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WaitStrategy {
    Poll { interval_ms: u64 },
    Notify { recheck_ms: u64 },
}

impl Default for WaitStrategy {
    fn default() -> Self {
        WaitStrategy::Poll { interval_ms: 100 }
    }
}

impl WaitStrategy {
    pub fn poll(interval: Duration) -> Self {
        WaitStrategy::Poll {
            interval_ms: interval.as_millis() as u64,
        }
    }

    pub fn notify(recheck: Duration) -> Self {
        WaitStrategy::Notify {
            recheck_ms: recheck.as_millis() as u64,
        }
    }

    /// Upper bound on one wait step; also the cancellation recheck period.
    pub fn period(&self) -> Duration {
        let ms = match *self {
            WaitStrategy::Poll { interval_ms } => interval_ms,
            WaitStrategy::Notify { recheck_ms } => recheck_ms,
        };
        Duration::from_millis(ms.max(1))
    }

    /// Wait at most one period, returning early under `Notify` when any channel
    /// becomes ready.
    pub fn wait_once(&self, channels: &[Arc<Channel>]) {
        match self {
            WaitStrategy::Poll { .. } => std::thread::sleep(self.period()),
            WaitStrategy::Notify { .. } => {
                let mut select = Select::new();
                for channel in channels {
                    select.recv(channel.receiver());
                }
                // Readiness is only a hint; the caller rescans in order.
                let _ = select.ready_timeout(self.period());
            }
        }
    }
}

/// Dequeue from the first non-empty channel, scanning in ascending order.
///
/// Returns the position of the channel in `channels` with the record.
pub fn dequeue_first(channels: &[Arc<Channel>]) -> Option<(usize, Record)> {
    channels
        .iter()
        .enumerate()
        .find_map(|(i, channel)| channel.try_dequeue().map(|record| (i, record)))
}
