//! Crate-level error types.

use std::io;

/// Crate-level error type.
///
/// The set is closed: every failure a public operation or the worker loop
/// can surface maps onto one of these variants. Transport errors are
/// folded in by kind so the value stays `Clone` and can be stored as the
/// worker's last error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Invalid configuration or API misuse.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation requires an established connection.
    #[error("not connected")]
    NotConnected,

    /// The remote end refused the connection.
    #[error("connection refused")]
    ConnectionRefused,

    /// No route to the host, or no endpoint in the list could be reached.
    #[error("host unreachable")]
    HostUnreachable,

    /// The operation's deadline expired.
    #[error("operation timed out")]
    TimedOut,

    /// The operation was cancelled.
    #[error("operation canceled")]
    Canceled,

    /// Ack mismatch or unparsable frame.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Everything else the transport surfaces.
    #[error("i/o error: {0}")]
    Io(String),
}

impl Error {
    /// Create an invalid-argument error with a message.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Create a protocol error with a message.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Returns true if this is a `TimedOut` error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::TimedOut)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Error::ConnectionRefused,
            io::ErrorKind::HostUnreachable | io::ErrorKind::NetworkUnreachable => {
                Error::HostUnreachable
            }
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Error::TimedOut,
            io::ErrorKind::NotConnected => Error::NotConnected,
            io::ErrorKind::Interrupted => Error::Canceled,
            _ => Error::Io(err.to_string()),
        }
    }
}

/// Crate-level result type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_kinds_map_onto_taxonomy() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(Error::from(refused), Error::ConnectionRefused);

        let timed_out = io::Error::from(io::ErrorKind::TimedOut);
        assert_eq!(Error::from(timed_out), Error::TimedOut);

        let not_connected = io::Error::from(io::ErrorKind::NotConnected);
        assert_eq!(Error::from(not_connected), Error::NotConnected);

        let other = io::Error::new(io::ErrorKind::UnexpectedEof, "short read");
        assert!(matches!(Error::from(other), Error::Io(_)));
    }
}
