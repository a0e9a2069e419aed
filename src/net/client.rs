//! Deadline-bounded TCP client.
//!
//! A very thin wrapper around a TCP socket that adds per-operation
//! deadlines and serialized access. Every operation takes `&mut self` and
//! is driven to completion before it returns, so there is never more than
//! one operation in flight on a connection: a read issued after a write
//! observes the completed write.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::Notify;

use crate::error::{Error, Result};
use crate::net::block_on_deadline;

/// TCP client with deadline-bounded connect, read and write.
///
/// Owns at most one connection. The I/O service behind `handle` must be
/// running while any operation is in progress.
pub struct TcpClient {
    handle: Handle,
    stream: Option<TcpStream>,
    cancel: Arc<Notify>,
}

impl TcpClient {
    /// Create a client bound to the given I/O service handle.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            stream: None,
            cancel: Arc::new(Notify::new()),
        }
    }

    /// Whether a connection is currently open.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Connect to the first reachable endpoint in the list.
    ///
    /// Each attempt starts from fresh socket state so nothing leaks from a
    /// failed try into the next. On failure the last attempt's error is
    /// returned; an empty list yields `HostUnreachable`.
    pub fn connect(&mut self, endpoints: &[SocketAddr], timeout: Duration) -> Result<()> {
        self.close();

        let handle = self.handle.clone();
        let mut last = Error::HostUnreachable;
        for &endpoint in endpoints {
            match block_on_deadline(&handle, timeout, async {
                TcpStream::connect(endpoint).await.map_err(Error::from)
            }) {
                Ok(stream) => {
                    self.stream = Some(stream);
                    return Ok(());
                }
                Err(err) => last = err,
            }
        }
        Err(last)
    }

    /// Read exactly `buf.len()` bytes, or fail with the first I/O error or
    /// a timeout. The number of bytes actually received is surfaced via
    /// `transferred` even on failure.
    pub fn read_exact(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
        transferred: Option<&mut usize>,
    ) -> Result<()> {
        let handle = self.handle.clone();
        let cancel = Arc::clone(&self.cancel);
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let mut read = 0usize;
        let result = block_on_deadline(&handle, timeout, async {
            while read < buf.len() {
                tokio::select! {
                    r = stream.read(&mut buf[read..]) => match r {
                        Ok(0) => return Err(Error::Io("connection closed by peer".into())),
                        Ok(n) => read += n,
                        Err(e) => return Err(Error::from(e)),
                    },
                    _ = cancel.notified() => return Err(Error::Canceled),
                }
            }
            Ok(())
        });

        if let Some(out) = transferred {
            *out = read;
        }
        result
    }

    /// Write all of `buf`, or fail with the first I/O error or a timeout.
    pub fn write_all(&mut self, buf: &[u8], timeout: Duration) -> Result<()> {
        let handle = self.handle.clone();
        let cancel = Arc::clone(&self.cancel);
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let mut written = 0usize;
        block_on_deadline(&handle, timeout, async {
            while written < buf.len() {
                tokio::select! {
                    r = stream.write(&buf[written..]) => match r {
                        Ok(0) => return Err(Error::Io("connection closed by peer".into())),
                        Ok(n) => written += n,
                        Err(e) => return Err(Error::from(e)),
                    },
                    _ = cancel.notified() => return Err(Error::Canceled),
                }
            }
            Ok(())
        })
    }

    /// Low-latency settings for streaming protocols: TCP_NODELAY plus
    /// keepalive.
    pub fn enable_low_latency(&self) -> Result<()> {
        let stream = self.stream.as_ref().ok_or(Error::NotConnected)?;
        stream.set_nodelay(true)?;
        socket2::SockRef::from(stream).set_keepalive(true)?;
        Ok(())
    }

    /// Best-effort cancellation of an outstanding operation. Idempotent;
    /// a cancellation with nothing in flight is a no-op.
    pub fn cancel(&self) {
        self.cancel.notify_waiters();
    }

    /// Tear down the connection: cancel, shut down both directions, close.
    /// Safe to call repeatedly.
    pub fn close(&mut self) {
        self.cancel();
        if let Some(mut stream) = self.stream.take() {
            let _ = self.handle.block_on(stream.shutdown());
        }
    }
}

impl Drop for TcpClient {
    fn drop(&mut self) {
        self.close();
    }
}
