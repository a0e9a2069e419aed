//! Constants that define Ether Dream networking and streaming behaviour.
//!
//! Keeping the values here prevents magic numbers from drifting across
//! modules and makes it easy to tune the integration in one place.

use std::time::Duration;

// Networking ------------------------------------------------------------------

/// TCP port the DAC listens on for streaming connections.
pub const DEFAULT_PORT: u16 = 7765;

/// Point rate the worker drives the DAC towards, in points per second.
pub const TARGET_POINT_RATE: u32 = 30_000;

/// Fallback per-operation timeout when the caller supplies none.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Timeout for establishing the TCP connection (usually longer than a
/// single read or write).
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// Streaming behaviour ---------------------------------------------------------

/// Device FIFO depth in points.
pub const FIFO_CAPACITY: usize = 1799;

/// Smallest data frame worth shipping; anything below this is deferred.
pub const MIN_PACKET_POINTS: usize = 150;

/// Floor on reported fullness assumed for scheduling. Devices of this
/// generation never report fewer points than this while playing.
pub const MIN_BUFFER_FLOOR: usize = 256;

/// Nominal loop pacing when no rate information is available.
pub const TICK_INTERVAL: Duration = Duration::from_millis(33);

/// Lower bound on the computed inter-iteration sleep.
pub const MIN_SLEEP: Duration = Duration::from_millis(1);

/// Upper bound on the computed inter-iteration sleep; keeps the loop
/// responsive to control-flag changes.
pub const MAX_SLEEP: Duration = Duration::from_millis(5);

/// Initial latency budget in milliseconds.
pub const DEFAULT_LATENCY_MS: i64 = 50;

/// Size of one acknowledgement frame: 2-byte header + 20-byte status.
pub const ACK_FRAME_SIZE: usize = 22;

/// Capacity pre-reserved for the outbound point buffer. Generous compared
/// to any hardware FIFO so the hot path never reallocates.
pub const POINT_BUFFER_RESERVE: usize = 30_000;
