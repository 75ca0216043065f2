//! Role drivers: the loops that call push and pull for each role.
//!
//! - [`ReplayService`]: store rows from producers, serve minibatches to consumers
//! - [`run_producer`]: parameters in, transitions out
//! - [`run_consumer`]: minibatches in, parameters out
//! - [`ServiceHandle`]: stop and join a driver running on its own thread

mod drivers;
mod handle;
mod replay;

pub use drivers::{run_consumer, run_producer, DriverStats, Produced};
pub use handle::{spawn_service, ServiceHandle};
pub use replay::{ReplayService, ReplayServiceConfig, ReplayStats};

#[cfg(test)]
mod tests;
