//! Producer and consumer driver loops.
//!
//! A producer (e.g. an environment worker) pulls parameters once, then keeps
//! pushing transitions and refreshes its parameters at episode boundaries
//! without blocking. A consumer (e.g. a learner) publishes its parameters,
//! then alternates between pulling a minibatch, training on it and
//! republishing.
//!
//! Both loops stop cleanly when their cancel token fires, including while
//! blocked inside a push or pull.

use std::ops::ControlFlow;

use crate::core::{CancelToken, Record};
use crate::payload::PayloadHolder;
use crate::relay::{RelayError, RelayModule};

/// What a producer step emitted.
#[derive(Debug, Clone, PartialEq)]
pub enum Produced {
    /// A transition in the middle of an episode.
    Transition(Record),
    /// The last transition of an episode.
    EpisodeEnd(Record),
    /// Nothing more to produce.
    Finished,
}

/// Counters for a driver loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub iterations: u64,
    pub records_pushed: u64,
    pub parameter_updates: u64,
}

/// `Ok(None)` when the operation was cancelled.
fn unless_cancelled<T>(result: Result<T, RelayError>) -> Result<Option<T>, RelayError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(RelayError::Cancelled) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Producer loop.
///
/// `parameters` is the sink end of the parameter edge; `experience` is the
/// source end of the experience edge. `produce` sees the current parameters
/// and returns the next transition.
pub fn run_producer<P, E, F>(
    parameters: &mut RelayModule<P>,
    experience: &mut RelayModule<E>,
    cancel: &CancelToken,
    mut produce: F,
) -> Result<DriverStats, RelayError>
where
    P: PayloadHolder,
    E: PayloadHolder,
    F: FnMut(&P) -> Produced,
{
    let mut stats = DriverStats::default();
    if unless_cancelled(parameters.pull())?.is_none() {
        return Ok(stats);
    }
    stats.parameter_updates += 1;
    log::debug!("producer[{}]: received initial parameters", experience.index());

    while !cancel.is_cancelled() {
        let (record, episode_end) = match produce(parameters.holder()) {
            Produced::Transition(record) => (record, false),
            Produced::EpisodeEnd(record) => (record, true),
            Produced::Finished => break,
        };
        stats.iterations += 1;

        match unless_cancelled(experience.push(Some(record), None))? {
            Some(report) => stats.records_pushed += report.delivered.len() as u64,
            None => break,
        }
        if episode_end && parameters.maybe_pull()? {
            stats.parameter_updates += 1;
        }
    }

    log::debug!("producer[{}]: stopped, {:?}", experience.index(), stats);
    Ok(stats)
}

/// Consumer loop.
///
/// `parameters` is the source end of the parameter edge; `batches` is the
/// sink end of the minibatch edge. `train` updates the parameters in place
/// from one minibatch and decides whether to continue.
pub fn run_consumer<P, B, F>(
    parameters: &mut RelayModule<P>,
    batches: &mut RelayModule<B>,
    cancel: &CancelToken,
    mut train: F,
) -> Result<DriverStats, RelayError>
where
    P: PayloadHolder,
    B: PayloadHolder,
    F: FnMut(&mut P, Record) -> ControlFlow<()>,
{
    let mut stats = DriverStats::default();
    if unless_cancelled(parameters.push(None, None))?.is_none() {
        return Ok(stats);
    }
    stats.parameter_updates += 1;

    while !cancel.is_cancelled() {
        let Some(batch) = unless_cancelled(batches.pull_data())? else {
            break;
        };
        stats.iterations += 1;

        let flow = train(parameters.holder_mut(), batch);
        match unless_cancelled(parameters.push(None, None))? {
            Some(report) => {
                stats.records_pushed += report.delivered.len() as u64;
                stats.parameter_updates += 1;
            }
            None => break,
        }
        if flow.is_break() {
            break;
        }
    }

    log::debug!("consumer[{}]: stopped, {:?}", batches.index(), stats);
    Ok(stats)
}
