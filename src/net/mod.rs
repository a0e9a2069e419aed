//! Networking layer: the shared I/O service, the deadline wrapper and the
//! deadline-bounded TCP client.

mod client;
mod deadline;
mod service;

pub use client::TcpClient;
pub use deadline::{block_on_deadline, millis_to_timeout};
pub use service::NetService;
