//! Owned I/O runtime shared by all networked components.

use std::io;
use tokio::runtime::{Builder, Handle, Runtime};

/// Dedicated I/O service driving all asynchronous socket and timer work.
///
/// One instance is kept alive for the lifetime of the process and passed
/// by reference into every networked component. A single worker thread
/// drives the reactor; devices block on it through
/// [`block_on_deadline`](super::block_on_deadline), so the service must
/// outlive every device built on top of it. Dropping the service joins
/// its thread.
pub struct NetService {
    runtime: Runtime,
}

impl NetService {
    /// Start the I/O service with one reactor thread.
    pub fn new() -> io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("etherdream-net")
            .enable_io()
            .enable_time()
            .build()?;
        Ok(Self { runtime })
    }

    /// Handle for submitting work to the service.
    pub fn handle(&self) -> &Handle {
        self.runtime.handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_drives_submitted_work() {
        let service = NetService::new().unwrap();
        let out = service.handle().block_on(async { 21 * 2 });
        assert_eq!(out, 42);
    }

    #[test]
    fn drop_joins_cleanly() {
        let service = NetService::new().unwrap();
        drop(service);
    }
}
