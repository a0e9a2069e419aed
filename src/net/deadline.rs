//! Deadline wrapper for asynchronous operations.

use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;

use crate::error::{Error, Result};

/// Drive `op` to completion against a single-shot timer on the service
/// runtime, blocking the calling thread until one of them finishes.
///
/// Whichever completes first wins: the operation's result is returned, or
/// [`Error::TimedOut`] if the timer fires while the operation is still in
/// flight. The loser is cancelled by being dropped, which is safe and
/// idempotent — a dropped future never runs a late completion.
///
/// A zero timeout still lets an already-ready operation win; anything
/// still pending at the first poll loses immediately. The runtime behind
/// `handle` must be live, otherwise this blocks indefinitely — keeping it
/// running is the caller's responsibility.
pub fn block_on_deadline<F, T>(handle: &Handle, timeout: Duration, op: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    handle.block_on(async {
        match tokio::time::timeout(timeout, op).await {
            Ok(result) => result,
            Err(_elapsed) => Err(Error::TimedOut),
        }
    })
}

/// Convert a caller-supplied millisecond value into an operation timeout.
/// Non-positive values clamp to zero, which times out any operation that
/// cannot complete on its first poll.
pub fn millis_to_timeout(millis: i64) -> Duration {
    Duration::from_millis(millis.max(0) as u64)
}
