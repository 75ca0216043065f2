//! Handles for role drivers running on their own threads.

use std::io;
use std::thread::{self, JoinHandle};

use crate::core::CancelToken;
use crate::relay::RelayError;

/// Handle for controlling a spawned driver thread.
pub struct ServiceHandle<T> {
    /// Thread handle
    pub thread: JoinHandle<Result<T, RelayError>>,
    /// Token observed by every blocking call of the driver
    pub cancel: CancelToken,
}

impl<T> ServiceHandle<T> {
    /// Ask the driver to stop; blocked pushes and pulls return promptly.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the driver thread to finish.
    pub fn join(self) -> thread::Result<Result<T, RelayError>> {
        self.thread.join()
    }

    /// Stop the driver and wait for it.
    pub fn shutdown(self) -> thread::Result<Result<T, RelayError>> {
        self.stop();
        self.join()
    }
}

/// Run `body` on a named thread, handing back a [`ServiceHandle`].
pub fn spawn_service<T, F>(
    name: impl Into<String>,
    cancel: CancelToken,
    body: F,
) -> io::Result<ServiceHandle<T>>
where
    T: Send + 'static,
    F: FnOnce(CancelToken) -> Result<T, RelayError> + Send + 'static,
{
    let token = cancel.clone();
    let thread = thread::Builder::new()
        .name(name.into())
        .spawn(move || body(token))?;
    Ok(ServiceHandle { thread, cancel })
}
